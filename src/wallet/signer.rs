//! Wallet signing capability.
//!
//! The engine never builds or signs transactions itself; a connected wallet
//! session supplied by the caller does that through [`Signer`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::ledger::{Address, Amount, StateInit};

/// A deployment message handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMessage {
    /// Address the contract will occupy.
    pub target: Address,
    /// Value attached to the message.
    pub amount: Amount,
    /// Code and initial data of the contract.
    pub state_init: StateInit,
    /// Optional message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Unix timestamp after which the wallet must not send the message.
    pub valid_until: i64,
}

/// Proof that a wallet accepted a message for sending.
///
/// A receipt does not mean the ledger applied the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Identifier of the sent message as reported by the wallet.
    pub message_hash: String,
    /// When the wallet accepted the message.
    pub submitted_at: DateTime<Utc>,
}

/// A connected wallet able to sign and send messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address of the wallet paying for deployments, if known.
    fn wallet_address(&self) -> Option<Address>;

    /// Signs the message and hands it to the ledger.
    async fn sign_and_submit(
        &self,
        message: &DeploymentMessage,
    ) -> Result<SubmissionReceipt, WalletError>;
}
