//! Ledger integration module.
//!
//! This module provides everything the engine needs to read from the ledger:
//! the API client, deterministic address derivation, balance validation,
//! confirmation polling, and the clock that paces it all.

mod address;
mod balance;
mod client;
mod clock;
mod poller;
mod types;

pub use address::{AddressDeriver, StateInit, SUPPORTED_WORKCHAINS};
pub use balance::{BalanceCheck, BalanceOracle, CostEstimate, CostLine};
pub use client::{LedgerApi, LedgerClient};
pub use clock::{Clock, SimulatedClock, SystemClock, elapsed_between, to_chrono};
pub use poller::{
    ConfirmationOutcome, ConfirmationPoller, PollSettings, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TOTAL_TIMEOUT_SECS,
};
pub use types::{AccountState, AccountStatus, Address, Amount, COIN_DECIMALS, NANO_PER_COIN};
