//! Transaction submission through a connected wallet.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::DeployError;
use crate::ledger::{Address, Amount, Clock, StateInit};

use super::signer::{DeploymentMessage, Signer, SubmissionReceipt};

/// Default validity window of a deployment message in seconds.
pub const DEFAULT_VALID_FOR_SECS: u64 = 300;

/// Hands deployment messages to a signer.
///
/// A successful submission only means the wallet accepted the message; the
/// caller still has to wait for the ledger to apply it.
pub struct TransactionSubmitter<'a> {
    signer: &'a dyn Signer,
    clock: &'a dyn Clock,
    valid_for: Duration,
}

impl<'a> TransactionSubmitter<'a> {
    /// Creates a submitter over a signer.
    #[must_use]
    pub const fn new(signer: &'a dyn Signer, clock: &'a dyn Clock, valid_for: Duration) -> Self {
        Self {
            signer,
            clock,
            valid_for,
        }
    }

    /// Sends one deployment message.
    ///
    /// `resource` names the contract in errors and logs.
    ///
    /// # Errors
    ///
    /// Returns `UserRejected` when the user declines, `SubmissionTimeout` when
    /// the wallet does not answer or the bridge fails, and
    /// `PreconditionFailed(WalletNotConnected)` when no session exists.
    pub async fn submit(
        &self,
        resource: &str,
        target: Address,
        amount: Amount,
        state_init: &StateInit,
        payload: Option<&str>,
    ) -> Result<SubmissionReceipt, DeployError> {
        let valid_for = chrono::Duration::from_std(self.valid_for).unwrap_or(chrono::Duration::MAX);
        let valid_until = self
            .clock
            .now()
            .checked_add_signed(valid_for)
            .map_or(i64::MAX, |t| t.timestamp());

        let message = DeploymentMessage {
            target,
            amount,
            state_init: state_init.clone(),
            payload: payload.map(str::to_string),
            valid_until,
        };

        info!("Submitting '{resource}' to {} with {amount}", target.short());

        match self.signer.sign_and_submit(&message).await {
            Ok(receipt) => {
                info!("Wallet accepted '{resource}' ({})", receipt.message_hash);
                Ok(receipt)
            }
            Err(e) => {
                warn!("Submission of '{resource}' failed: {e}");
                Err(DeployError::from_wallet(resource, e))
            }
        }
    }
}
