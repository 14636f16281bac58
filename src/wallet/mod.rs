//! Wallet integration module.
//!
//! The funding wallet is an external collaborator reached through the
//! [`Signer`] capability; [`HttpWalletSigner`] is the bridge-backed
//! implementation used by the CLI.

mod bridge;
mod signer;
mod submitter;

pub use bridge::HttpWalletSigner;
pub use signer::{DeploymentMessage, Signer, SubmissionReceipt};
pub use submitter::{TransactionSubmitter, DEFAULT_VALID_FOR_SECS};

#[cfg(test)]
pub use signer::MockSigner;
