//! Confirmation polling for submitted deployments.
//!
//! A deployment is only observable as "the account at the derived address is
//! active, has code, and is funded". The poller watches for that with a
//! bounded number of attempts; the wall-clock timeout is a secondary bound.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::LedgerApi;
use super::clock::{Clock, elapsed_between};
use super::types::{AccountState, Address};

/// Default number of polling attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Default delay between attempts in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default overall polling budget in seconds.
pub const DEFAULT_TOTAL_TIMEOUT_SECS: u64 = 120;

/// Polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Maximum number of attempts before the final check.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub poll_interval: Duration,
    /// Secondary wall-clock bound.
    pub total_timeout: Duration,
}

/// Result of waiting for a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationOutcome {
    /// Whether the deployment was observed.
    pub confirmed: bool,
    /// Number of ledger queries performed, including the final check.
    pub attempts: u32,
    /// Last state successfully read, if any.
    pub last_state: Option<AccountState>,
    /// Time spent polling according to the clock.
    pub elapsed: Duration,
}

/// Polls the ledger until a deployment becomes visible.
pub struct ConfirmationPoller<'a> {
    ledger: &'a dyn LedgerApi,
    clock: &'a dyn Clock,
    settings: PollSettings,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            total_timeout: Duration::from_secs(DEFAULT_TOTAL_TIMEOUT_SECS),
        }
    }
}

impl PollSettings {
    /// Returns the nominal polling budget (`max_attempts × poll_interval`).
    #[must_use]
    pub fn nominal_budget(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

impl<'a> ConfirmationPoller<'a> {
    /// Creates a poller.
    #[must_use]
    pub const fn new(ledger: &'a dyn LedgerApi, clock: &'a dyn Clock, settings: PollSettings) -> Self {
        Self {
            ledger,
            clock,
            settings,
        }
    }

    /// Waits until the account at `address` is deployed or the budget is spent.
    ///
    /// Each attempt takes at most one poll interval: a query that does not
    /// answer within the interval counts as a failed attempt. After the last
    /// attempt exactly one final check is performed.
    pub async fn await_confirmation(&self, address: &Address) -> ConfirmationOutcome {
        let start = self.clock.now();
        let mut attempts = 0;
        let mut last_state = None;

        info!(
            "Waiting for {} (up to {} attempts every {:?})",
            address.short(),
            self.settings.max_attempts,
            self.settings.poll_interval
        );

        while attempts < self.settings.max_attempts {
            let attempt_start = self.clock.now();
            attempts += 1;

            if let Some(state) = self.query(address, attempts).await {
                if state.is_deployed() {
                    info!("Confirmed {} after {attempts} attempts", address.short());
                    return self.outcome(true, attempts, Some(state), start);
                }
                if state.looks_bounced() {
                    warn!(
                        "{} is still uninitialized with zero balance (attempt {attempts}); the message may have bounced",
                        address.short()
                    );
                } else {
                    debug!("{} is {} (attempt {attempts})", address.short(), state.status);
                }
                last_state = Some(state);
            }

            if elapsed_between(start, self.clock.now()) >= self.settings.total_timeout {
                warn!(
                    "Polling timeout of {:?} reached for {}",
                    self.settings.total_timeout,
                    address.short()
                );
                break;
            }

            if attempts < self.settings.max_attempts {
                let spent = elapsed_between(attempt_start, self.clock.now());
                self.clock
                    .sleep(self.settings.poll_interval.saturating_sub(spent))
                    .await;
            }
        }

        // Final confirmation check after the budget is spent.
        attempts += 1;
        if let Some(state) = self.query(address, attempts).await {
            let confirmed = state.is_deployed();
            if confirmed {
                info!("Confirmed {} on the final check", address.short());
            }
            return self.outcome(confirmed, attempts, Some(state), start);
        }

        warn!("Could not confirm {} after {attempts} attempts", address.short());
        self.outcome(false, attempts, last_state, start)
    }

    /// Runs one bounded query, logging failures.
    async fn query(&self, address: &Address, attempt: u32) -> Option<AccountState> {
        match tokio::time::timeout(self.settings.poll_interval, self.ledger.account_state(address))
            .await
        {
            Ok(Ok(state)) => Some(state),
            Ok(Err(e)) => {
                warn!("Query for {} failed on attempt {attempt}: {e}", address.short());
                None
            }
            Err(_) => {
                warn!(
                    "Query for {} did not answer within {:?} on attempt {attempt}",
                    address.short(),
                    self.settings.poll_interval
                );
                None
            }
        }
    }

    fn outcome(
        &self,
        confirmed: bool,
        attempts: u32,
        last_state: Option<AccountState>,
        start: chrono::DateTime<chrono::Utc>,
    ) -> ConfirmationOutcome {
        ConfirmationOutcome {
            confirmed,
            attempts,
            last_state,
            elapsed: elapsed_between(start, self.clock.now()),
        }
    }
}
