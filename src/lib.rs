// ============================================================================
// Linting
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, missing_docs))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Deploy Contracts
//!
//! Phase-ordered deployment of smart contracts to a ledger, with
//! pre-flight checks, confirmation polling, and a persisted report of every run.
//!
//! ## Overview
//!
//! A deployment is described in a YAML file and turned into a plan of
//! phases, each holding prioritized steps:
//!
//! 1. **Verification**: wallet connection, funding balance, and contract definitions
//! 2. **Deployment**: one step per contract: derive its address, submit, poll until confirmed
//! 3. **Validation**: re-check every deployed contract (optional)
//! 4. **Finalization**: summarise the run
//!
//! A failing critical step halts the run; failures of lower priority are
//! recorded as warnings. Every run produces a [`state::DeploymentReport`].
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`ledger`]: Ledger client, address derivation, balances, and polling
//! - [`wallet`]: Signing capability and message submission
//! - [`planner`]: Plan model, plan building, and step/phase execution
//! - [`orchestrator`]: Run engine, run context, and progress observers
//! - [`state`]: Report storage and per-wallet run locks
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: my-dapp
//!   environment: testnet
//!
//! network:
//!   endpoint: https://testnet.toncenter.com/api/v2
//!
//! contracts:
//!   - name: registry
//!     code: "b5ee9c72"
//!     data: "00"
//!     amount: "0.05"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod planner;
pub mod state;
pub mod wallet;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeployConfig};
pub use error::{DeployError, HalldyllError, Result};
pub use ledger::{Address, Amount, LedgerApi, LedgerClient};
pub use orchestrator::{DeploymentOrchestrator, RunFailure, RunSettings};
pub use planner::{DeploymentPlan, PlanBuilder};
pub use state::{DeploymentReport, LocalReportStore, ReportStore};
pub use wallet::{HttpWalletSigner, Signer};
