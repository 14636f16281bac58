//! Error types for the Halldyll contract deployment system.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, report storage, the ledger API, the wallet bridge, and the
//! deployment taxonomy that steps fail with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{Address, Amount};

/// The main error type for the Halldyll contract deployment system.
#[derive(Debug, Error)]
pub enum HalldyllError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Report storage and locking errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Ledger API errors.
    #[error("Ledger API error: {0}")]
    Ledger(#[from] LedgerError),

    /// Wallet bridge errors.
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Deployment step errors.
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Report storage and locking errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// A stored report is unreadable.
    #[error("Stored report is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Writing to the report directory failed.
    #[error("Failed to write report storage: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire run lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// The funding wallet is locked by another run.
    #[error("Funding wallet is in use by another run (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("Report serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// No report exists under the requested id.
    #[error("Deployment report not found: {deployment_id}")]
    ReportNotFound {
        /// The requested deployment id.
        deployment_id: String,
    },
}

/// Ledger API errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// API request failed with a non-success status.
    #[error("Ledger API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Ledger API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with the ledger: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from ledger API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A string could not be parsed as an address.
    #[error("Invalid address '{value}': {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A string could not be parsed as an amount.
    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors reported by a wallet signing capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// No wallet session is connected.
    #[error("Wallet is not connected")]
    NotConnected,

    /// The user declined the request in the wallet.
    #[error("Request rejected in wallet: {message}")]
    Rejected {
        /// Message returned by the wallet.
        message: String,
    },

    /// The wallet did not answer in time.
    #[error("Wallet request timed out: {message}")]
    Timeout {
        /// Description of the timeout.
        message: String,
    },

    /// The wallet bridge could not be reached or answered garbage.
    #[error("Wallet bridge failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

/// Reasons a precondition of the deployment does not hold.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// No signer is available for the run.
    #[error("wallet not connected")]
    WalletNotConnected,

    /// The funding account cannot cover the estimated cost.
    #[error("insufficient balance: required {required}, available {available}, shortfall {shortfall}")]
    InsufficientBalance {
        /// Estimated cost of the deployment.
        required: Amount,
        /// Spendable balance observed on the ledger.
        available: Amount,
        /// Missing amount.
        shortfall: Amount,
    },

    /// A contract definition cannot be deployed as written.
    #[error("invalid resource definition '{resource}': {message}")]
    InvalidResourceDefinition {
        /// Logical contract name.
        resource: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Failures raised by deployment steps.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// A precondition does not hold.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(#[from] PreconditionError),

    /// The signer declined the submission.
    #[error("Submission rejected by signer: {message}")]
    UserRejected {
        /// Message returned by the signer.
        message: String,
    },

    /// The transaction was not accepted or routed in time.
    #[error("Submission for '{resource}' timed out: {message}")]
    SubmissionTimeout {
        /// Logical contract name.
        resource: String,
        /// Description of the timeout.
        message: String,
    },

    /// Polling exhausted its budget without observing a deployed account.
    #[error("Contract at {address} was not confirmed after {attempts} attempts")]
    ConfirmationTimeout {
        /// Address that was watched.
        address: Address,
        /// Number of ledger queries performed.
        attempts: u32,
    },

    /// The ledger could not be queried.
    #[error("Ledger unreachable: {message}")]
    LedgerUnreachable {
        /// Description of the failure.
        message: String,
    },

    /// The step id does not resolve to a registered action.
    #[error("Unknown step: {id}")]
    UnknownStep {
        /// The unresolved step id.
        id: String,
    },

    /// Post-deployment validation did not hold.
    #[error("Verification of '{resource}' failed: {message}")]
    VerificationFailed {
        /// Logical contract name.
        resource: String,
        /// What was observed instead.
        message: String,
    },
}

/// Serialisable classification of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`DeployError::PreconditionFailed`].
    PreconditionFailed,
    /// See [`DeployError::UserRejected`].
    UserRejected,
    /// See [`DeployError::SubmissionTimeout`].
    SubmissionTimeout,
    /// See [`DeployError::ConfirmationTimeout`].
    ConfirmationTimeout,
    /// See [`DeployError::LedgerUnreachable`].
    LedgerUnreachable,
    /// See [`DeployError::UnknownStep`].
    UnknownStep,
    /// See [`DeployError::VerificationFailed`].
    VerificationFailed,
}

/// Result type alias for Halldyll operations.
pub type Result<T> = std::result::Result<T, HalldyllError>;

impl HalldyllError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Ledger(LedgerError::RateLimited { .. } | LedgerError::NetworkError { .. })
                | Self::State(StateError::LockFailed { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Ledger(LedgerError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Ledger(LedgerError::NetworkError { .. }) => Some(1),
            Self::State(StateError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl LedgerError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

impl DeployError {
    /// Returns the serialisable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::UserRejected { .. } => ErrorKind::UserRejected,
            Self::SubmissionTimeout { .. } => ErrorKind::SubmissionTimeout,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::LedgerUnreachable { .. } => ErrorKind::LedgerUnreachable,
            Self::UnknownStep { .. } => ErrorKind::UnknownStep,
            Self::VerificationFailed { .. } => ErrorKind::VerificationFailed,
        }
    }

    /// Returns true if this failure aborts its phase whatever the step priority.
    #[must_use]
    pub const fn always_critical(&self) -> bool {
        matches!(self, Self::PreconditionFailed(_) | Self::UnknownStep { .. })
    }

    /// Returns true if the failure is an expected user decision rather than a fault.
    #[must_use]
    pub const fn is_user_action(&self) -> bool {
        matches!(self, Self::UserRejected { .. })
    }

    /// Creates a ledger-unreachable error from any displayable cause.
    #[must_use]
    pub fn ledger_unreachable(cause: impl std::fmt::Display) -> Self {
        Self::LedgerUnreachable {
            message: cause.to_string(),
        }
    }

    /// Creates an invalid-resource-definition precondition failure.
    #[must_use]
    pub fn invalid_resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PreconditionFailed(PreconditionError::InvalidResourceDefinition {
            resource: resource.into(),
            message: message.into(),
        })
    }

    /// Maps a wallet failure for the given contract onto the deployment taxonomy.
    #[must_use]
    pub fn from_wallet(resource: &str, error: WalletError) -> Self {
        match error {
            WalletError::NotConnected => {
                Self::PreconditionFailed(PreconditionError::WalletNotConnected)
            }
            WalletError::Rejected { message } => Self::UserRejected { message },
            WalletError::Timeout { message } | WalletError::Transport { message } => {
                Self::SubmissionTimeout {
                    resource: resource.to_string(),
                    message,
                }
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PreconditionFailed => "precondition_failed",
            Self::UserRejected => "user_rejected",
            Self::SubmissionTimeout => "submission_timeout",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::LedgerUnreachable => "ledger_unreachable",
            Self::UnknownStep => "unknown_step",
            Self::VerificationFailed => "verification_failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_classes() {
        let precondition = DeployError::PreconditionFailed(PreconditionError::WalletNotConnected);
        assert!(precondition.always_critical());
        assert!(DeployError::UnknownStep { id: String::from("x") }.always_critical());
        assert!(!DeployError::ledger_unreachable("down").always_critical());
    }

    #[test]
    fn test_wallet_error_mapping() {
        let rejected = DeployError::from_wallet(
            "catalogue",
            WalletError::Rejected {
                message: String::from("declined"),
            },
        );
        assert_eq!(rejected.kind(), ErrorKind::UserRejected);
        assert!(rejected.is_user_action());

        let timeout = DeployError::from_wallet(
            "catalogue",
            WalletError::Timeout {
                message: String::from("no answer"),
            },
        );
        assert_eq!(timeout.kind(), ErrorKind::SubmissionTimeout);

        let missing = DeployError::from_wallet("catalogue", WalletError::NotConnected);
        assert_eq!(missing.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_retryable() {
        let err = HalldyllError::Ledger(LedgerError::network("reset"));
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_secs(), Some(1));

        let err = HalldyllError::Ledger(LedgerError::api_error(500, "boom"));
        assert!(!err.is_retryable());
    }
}
