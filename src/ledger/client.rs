//! Ledger API client implementation.
//!
//! This module provides the [`LedgerApi`] capability used by the engine and
//! its HTTP implementation against a TON-Center style v2 JSON API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{HalldyllError, LedgerError, Result};

use super::types::{AccountState, AccountStatus, Address, Amount};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 500;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-API-Key";

/// Read access to the ledger.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Queries the current state of an account.
    async fn account_state(&self, address: &Address) -> Result<AccountState>;

    /// Queries the spendable balance of an account.
    async fn balance(&self, address: &Address) -> Result<Amount> {
        Ok(self.account_state(address).await?.balance)
    }
}

/// HTTP ledger API client.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    /// HTTP client.
    client: Client,
    /// API base URL without a trailing slash.
    endpoint: String,
    /// Optional API key.
    api_key: Option<String>,
    /// Attempts per request.
    max_retries: u32,
}

/// Envelope of every API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

/// Payload of `getAddressInformation`.
#[derive(Debug, Deserialize)]
struct AddressInformation {
    balance: BalanceField,
    #[serde(default)]
    code: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    state: AccountStatus,
}

/// Balances arrive either as strings or as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BalanceField {
    Text(String),
    Number(u64),
}

impl LedgerClient {
    /// Creates a new ledger API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, api_key, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(endpoint: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LedgerError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_retries: MAX_RETRIES,
        })
    }

    /// Sets the number of attempts per request.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes a GET request with retries on transient failures.
    async fn get<T: for<'de> Deserialize<'de>>(&self, method: &str, address: &Address) -> Result<T> {
        let mut last_error = None;
        let mut delay = Duration::ZERO;

        for attempt in 0..self.max_retries.max(1) {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {} in {delay:?}", self.max_retries);
                tokio::time::sleep(delay).await;
            }

            match self.get_once::<T>(method, address).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        delay = retry_delay(&e, attempt + 1);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            HalldyllError::Ledger(LedgerError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    /// Executes a single GET request.
    async fn get_once<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        address: &Address,
    ) -> Result<T> {
        let url = format!("{}/{method}", self.endpoint);
        trace!("GET {url} address={address}");

        let mut request = self
            .client
            .get(&url)
            .query(&[("address", address.to_raw())]);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            HalldyllError::Ledger(LedgerError::NetworkError {
                message: format!("Request failed: {e}"),
            })
        })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);

            return Err(HalldyllError::Ledger(LedgerError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HalldyllError::Ledger(LedgerError::api_error(
                status.as_u16(),
                body,
            )));
        }

        let api_response: ApiResponse<T> = response.json().await.map_err(|e| {
            HalldyllError::Ledger(LedgerError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })?;

        if !api_response.ok {
            return Err(HalldyllError::Ledger(LedgerError::InvalidResponse {
                message: api_response
                    .error
                    .unwrap_or_else(|| String::from("API reported failure")),
            }));
        }

        api_response.result.ok_or_else(|| {
            HalldyllError::Ledger(LedgerError::InvalidResponse {
                message: String::from("No result in response"),
            })
        })
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn account_state(&self, address: &Address) -> Result<AccountState> {
        let info: AddressInformation = self.get("getAddressInformation", address).await?;

        let balance = match info.balance {
            BalanceField::Number(n) => Amount::from_nano(n),
            BalanceField::Text(text) => text.trim().parse::<u64>().map(Amount::from_nano).map_err(|_| {
                HalldyllError::Ledger(LedgerError::InvalidResponse {
                    message: format!("Balance is not an integer: {text}"),
                })
            })?,
        };

        Ok(AccountState {
            status: info.state,
            balance,
            code: info.code,
            data: info.data,
        })
    }
}

/// Delay before the next attempt after `error` on attempt `attempt`.
///
/// Rate limiting honours the server's `Retry-After`; other transient
/// failures back off linearly.
fn retry_delay(error: &HalldyllError, attempt: u32) -> Duration {
    match (error, error.retry_delay_secs()) {
        (HalldyllError::Ledger(LedgerError::RateLimited { .. }), Some(secs)) => {
            Duration::from_secs(secs)
        }
        _ => Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address() -> Address {
        Address::new(0, [7u8; 32])
    }

    #[tokio::test]
    async fn test_account_state_active() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .and(query_param("address", address().to_raw()))
            .and(header(API_KEY_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "balance": "50000000",
                    "code": "te6cckEBAQEA",
                    "data": "te6cckEBAQEA",
                    "state": "active"
                }
            })))
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), Some(String::from("secret")))
            .expect("client");
        let state = client.account_state(&address()).await.expect("state");

        assert_eq!(state.status, AccountStatus::Active);
        assert_eq!(state.balance, Amount::from_nano(50_000_000));
        assert!(state.is_deployed());
        assert_eq!(
            client.balance(&address()).await.expect("balance"),
            Amount::from_nano(50_000_000)
        );
    }

    #[tokio::test]
    async fn test_account_state_uninitialized_numeric_balance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "balance": 0, "state": "uninitialized" }
            })))
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), None).expect("client");
        let state = client.account_state(&address()).await.expect("state");

        assert!(state.looks_bounced());
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), None).expect("client");
        let err = client.account_state(&address()).await.expect_err("must fail");

        assert!(matches!(
            err,
            HalldyllError::Ledger(LedgerError::ApiRequestFailed { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_api_level_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": "Incorrect address"
            })))
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), None).expect("client");
        let err = client.account_state(&address()).await.expect_err("must fail");

        assert!(err.to_string().contains("Incorrect address"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .expect(2)
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), None)
            .expect("client")
            .with_max_retries(2);
        let err = client.account_state(&address()).await.expect_err("must fail");

        assert!(err.is_retryable());
    }

    #[test]
    fn test_retry_delay_honours_retry_after() {
        let limited = HalldyllError::Ledger(LedgerError::RateLimited { retry_after_secs: 7 });
        assert_eq!(retry_delay(&limited, 1), Duration::from_secs(7));

        let network = HalldyllError::Ledger(LedgerError::network("reset"));
        assert_eq!(retry_delay(&network, 1), Duration::from_millis(RETRY_DELAY_MS));
        assert_eq!(retry_delay(&network, 3), Duration::from_millis(RETRY_DELAY_MS * 3));
    }

    #[tokio::test]
    async fn test_rate_limit_recovers_after_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/getAddressInformation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "balance": "5", "state": "active", "code": "c", "data": "d" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LedgerClient::new(&server.uri(), None).expect("client");
        let balance = client.balance(&address()).await.expect("balance");

        assert_eq!(balance, Amount::from_nano(5));
    }
}
