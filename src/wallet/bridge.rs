//! HTTP wallet bridge signer.
//!
//! Talks to a local wallet bridge that relays sign requests to the user's
//! wallet session and waits for the user's decision.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{HalldyllError, LedgerError, Result, WalletError};
use crate::ledger::{Address, StateInit};

use super::signer::{DeploymentMessage, Signer, SubmissionReceipt};

/// Default time to wait for the user's decision, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Bridge error code for a request the user declined.
const USER_REJECTS_ERROR: i64 = 300;

/// Bridge error code for a missing wallet session.
const SESSION_NOT_FOUND_ERROR: i64 = 100;

/// Signer backed by a wallet bridge HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpWalletSigner {
    /// HTTP client.
    client: Client,
    /// Bridge base URL without a trailing slash.
    bridge_url: String,
    /// Funding wallet address.
    from: Address,
}

/// Sign request sent to the bridge.
#[derive(Debug, Serialize)]
struct SendTransactionRequest<'a> {
    from: String,
    valid_until: i64,
    messages: Vec<WireMessage<'a>>,
}

/// A single message in bridge wire format.
#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    address: String,
    amount: String,
    state_init: &'a StateInit,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a str>,
}

/// Successful bridge response.
#[derive(Debug, Deserialize)]
struct SendTransactionResponse {
    message_hash: String,
}

/// Failed bridge response.
#[derive(Debug, Deserialize)]
struct BridgeErrorResponse {
    error: BridgeError,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    code: i64,
    #[serde(default)]
    message: String,
}

impl HttpWalletSigner {
    /// Creates a signer for the given bridge and funding wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(bridge_url: &str, from: Address) -> Result<Self> {
        Self::with_timeout(bridge_url, from, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    /// Creates a signer with a custom decision timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(bridge_url: &str, from: Address, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                HalldyllError::Ledger(LedgerError::network(format!(
                    "Failed to create HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            client,
            bridge_url: bridge_url.trim_end_matches('/').to_string(),
            from,
        })
    }

    /// Maps a bridge error body onto the wallet taxonomy.
    fn map_bridge_error(status: u16, body: &str) -> WalletError {
        if let Ok(parsed) = serde_json::from_str::<BridgeErrorResponse>(body) {
            match parsed.error.code {
                USER_REJECTS_ERROR => {
                    return WalletError::Rejected {
                        message: parsed.error.message,
                    };
                }
                SESSION_NOT_FOUND_ERROR => return WalletError::NotConnected,
                _ => {}
            }
        }

        match status {
            408 | 504 => WalletError::Timeout {
                message: format!("bridge answered {status}"),
            },
            _ => WalletError::Transport {
                message: format!("bridge answered {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl Signer for HttpWalletSigner {
    fn wallet_address(&self) -> Option<Address> {
        Some(self.from)
    }

    async fn sign_and_submit(
        &self,
        message: &DeploymentMessage,
    ) -> std::result::Result<SubmissionReceipt, WalletError> {
        let url = format!("{}/v1/transactions", self.bridge_url);
        let request = SendTransactionRequest {
            from: self.from.to_raw(),
            valid_until: message.valid_until,
            messages: vec![WireMessage {
                address: message.target.to_raw(),
                amount: message.amount.as_nano().to_string(),
                state_init: &message.state_init,
                payload: message.payload.as_deref(),
            }],
        };

        info!("Requesting wallet signature for deployment to {}", message.target.short());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WalletError::Timeout {
                        message: e.to_string(),
                    }
                } else if e.is_connect() {
                    warn!("Wallet bridge at {} is not reachable: {e}", self.bridge_url);
                    WalletError::NotConnected
                } else {
                    WalletError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Wallet bridge error {status}: {body}");
            return Err(Self::map_bridge_error(status.as_u16(), &body));
        }

        let parsed: SendTransactionResponse =
            response.json().await.map_err(|e| WalletError::Transport {
                message: format!("Failed to parse bridge response: {e}"),
            })?;

        Ok(SubmissionReceipt {
            message_hash: parsed.message_hash,
            submitted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Amount;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> DeploymentMessage {
        DeploymentMessage {
            target: Address::new(0, [3u8; 32]),
            amount: Amount::from_nano(50_000_000),
            state_init: StateInit {
                code: vec![1, 2],
                data: vec![3],
            },
            payload: None,
            valid_until: 1_700_000_000,
        }
    }

    fn funding() -> Address {
        Address::new(0, [1u8; 32])
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .and(body_partial_json(serde_json::json!({
                "from": funding().to_raw(),
                "valid_until": 1_700_000_000,
                "messages": [{
                    "address": Address::new(0, [3u8; 32]).to_raw(),
                    "amount": "50000000",
                    "state_init": { "code": "0102", "data": "03" }
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "message_hash": "abc123" })),
            )
            .mount(&server)
            .await;

        let signer = HttpWalletSigner::new(&server.uri(), funding()).expect("signer");
        let receipt = signer.sign_and_submit(&message()).await.expect("receipt");

        assert_eq!(receipt.message_hash, "abc123");
        assert_eq!(signer.wallet_address(), Some(funding()));
    }

    #[tokio::test]
    async fn test_user_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": 300, "message": "User declined the transaction" }
            })))
            .mount(&server)
            .await;

        let signer = HttpWalletSigner::new(&server.uri(), funding()).expect("signer");
        let err = signer.sign_and_submit(&message()).await.expect_err("rejected");

        assert_eq!(
            err,
            WalletError::Rejected {
                message: String::from("User declined the transaction")
            }
        );
    }

    #[tokio::test]
    async fn test_missing_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": { "code": 100, "message": "no session" }
            })))
            .mount(&server)
            .await;

        let signer = HttpWalletSigner::new(&server.uri(), funding()).expect("signer");
        let err = signer.sign_and_submit(&message()).await.expect_err("no session");

        assert_eq!(err, WalletError::NotConnected);
    }

    #[tokio::test]
    async fn test_gateway_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let signer = HttpWalletSigner::new(&server.uri(), funding()).expect("signer");
        let err = signer.sign_and_submit(&message()).await.expect_err("timeout");

        assert!(matches!(err, WalletError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_slow_wallet_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "message_hash": "late" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let signer = HttpWalletSigner::with_timeout(&server.uri(), funding(), 1).expect("signer");
        let err = signer.sign_and_submit(&message()).await.expect_err("timeout");

        assert!(matches!(err, WalletError::Timeout { .. }));
    }
}
