//! Configuration specification types for contract deployments.
//!
//! This module defines all the structs that map to the `halldyll.contracts.yaml`
//! file. A configuration fully describes which contracts to deploy, where, and
//! under which policy.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, HalldyllError, Result};
use crate::ledger::{Address, Amount, PollSettings, StateInit};
use crate::planner::{ContractDefinition, Priority};

/// Default report directory, relative to the working directory.
pub const DEFAULT_REPORT_DIR: &str = ".halldyll/deployments";

/// The root configuration structure for a contract deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Ledger API configuration.
    pub network: NetworkConfig,
    /// Funding wallet configuration.
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Contracts to deploy, in deployment order.
    pub contracts: Vec<ContractConfig>,
    /// Confirmation polling budget.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Run policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Report storage.
    #[serde(default)]
    pub state: StateConfig,
    /// Optional explicit plan; the default plan is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseConfig>>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Network label (e.g., "testnet", "mainnet").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Ledger API configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Base URL of the ledger HTTP API.
    pub endpoint: String,
    /// Optional API key; `LEDGER_API_KEY` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_network_timeout")]
    pub timeout_secs: u64,
}

/// Funding wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletConfig {
    /// Raw address of the account paying for deployments.
    #[serde(default)]
    pub funding_address: String,
    /// URL of the wallet bridge used for signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,
    /// How long to wait for the user's decision in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Validity window of deployment messages in seconds.
    #[serde(default = "default_valid_for")]
    pub valid_for_secs: u64,
}

/// A contract definition as written in the configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractConfig {
    /// Logical name, unique within the project.
    pub name: String,
    /// Hex-encoded contract code.
    pub code: String,
    /// Hex-encoded initial data.
    #[serde(default)]
    pub data: String,
    /// Target workchain.
    #[serde(default)]
    pub workchain: i32,
    /// Value attached to the deployment message, in coins.
    pub amount: String,
    /// Priority of the deploy step.
    #[serde(default)]
    pub priority: Priority,
    /// Optional message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Display description.
    #[serde(default)]
    pub description: String,
}

/// Confirmation polling budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationConfig {
    /// Maximum number of polling attempts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Secondary wall-clock bound in seconds.
    #[serde(default = "default_confirmation_timeout")]
    pub timeout_secs: u64,
}

/// Whether a failed balance query blocks the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BalanceCheckPolicy {
    /// An unreachable ledger fails the balance step.
    #[default]
    Blocking,
    /// An unreachable ledger only adds a warning.
    Advisory,
}

/// Run policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Balance check policy.
    #[serde(default)]
    pub balance_check: BalanceCheckPolicy,
    /// Fee reserved per contract on top of its amount, in coins.
    #[serde(default = "default_fee_reserve")]
    pub fee_reserve: String,
    /// Whether to add a validation phase re-checking every address.
    #[serde(default = "default_true")]
    pub verify_after_deploy: bool,
    /// Pause after each deployment in milliseconds.
    #[serde(default)]
    pub pacing_ms: u64,
}

/// Report storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Report directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// An explicit phase definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Phase identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Steps in execution order.
    pub steps: Vec<StepConfig>,
}

/// An explicit step definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepConfig {
    /// Step id, resolved against the step registry.
    pub id: String,
    /// Display title; derived from the id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Escalation policy.
    #[serde(default)]
    pub priority: Priority,
    /// Expected duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_secs: Option<u64>,
}

// Default value functions

const fn default_network_timeout() -> u64 {
    30
}

const fn default_request_timeout() -> u64 {
    300
}

const fn default_valid_for() -> u64 {
    crate::wallet::DEFAULT_VALID_FOR_SECS
}

const fn default_max_attempts() -> u32 {
    crate::ledger::DEFAULT_MAX_ATTEMPTS
}

const fn default_poll_interval() -> u64 {
    crate::ledger::DEFAULT_POLL_INTERVAL_SECS
}

const fn default_confirmation_timeout() -> u64 {
    crate::ledger::DEFAULT_TOTAL_TIMEOUT_SECS
}

const fn default_true() -> bool {
    true
}

fn default_environment() -> String {
    String::from("testnet")
}

fn default_fee_reserve() -> String {
    String::from("0.05")
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            funding_address: String::new(),
            bridge_url: None,
            request_timeout_secs: default_request_timeout(),
            valid_for_secs: default_valid_for(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_confirmation_timeout(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            balance_check: BalanceCheckPolicy::default(),
            fee_reserve: default_fee_reserve(),
            verify_after_deploy: true,
            pacing_ms: 0,
        }
    }
}

impl DeployConfig {
    /// Returns contract names in deployment order.
    #[must_use]
    pub fn contract_names(&self) -> Vec<&str> {
        self.contracts.iter().map(|c| c.name.as_str()).collect()
    }

    /// Parses the funding address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address is missing or malformed.
    pub fn funding_address(&self) -> Result<Address> {
        if self.wallet.funding_address.trim().is_empty() {
            return Err(HalldyllError::Config(ConfigError::validation(
                "Funding address is not set (wallet.funding_address or HALLDYLL_FUNDING_ADDRESS)",
                "wallet.funding_address",
            )));
        }
        self.wallet.funding_address.parse().map_err(|e| {
            HalldyllError::Config(ConfigError::validation(
                format!("{e}"),
                "wallet.funding_address",
            ))
        })
    }

    /// Decodes every contract definition in order.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error.
    pub fn contract_definitions(&self) -> Result<Vec<ContractDefinition>> {
        self.contracts
            .iter()
            .enumerate()
            .map(|(i, c)| c.decode(&format!("contracts[{i}]")))
            .collect()
    }

    /// Parses the per-contract fee reserve.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the amount is malformed.
    pub fn fee_reserve(&self) -> Result<Amount> {
        Amount::parse_coins(&self.policy.fee_reserve).map_err(|e| {
            HalldyllError::Config(ConfigError::validation(format!("{e}"), "policy.fee_reserve"))
        })
    }

    /// Returns the report directory.
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        PathBuf::from(self.state.path.as_deref().unwrap_or(DEFAULT_REPORT_DIR))
    }
}

impl ContractConfig {
    /// Decodes the hex fields and the amount.
    ///
    /// `field` prefixes the field path in errors.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn decode(&self, field: &str) -> Result<ContractDefinition> {
        let code = hex::decode(self.code.trim()).map_err(|e| {
            HalldyllError::Config(ConfigError::validation(
                format!("Contract '{}' code is not valid hex: {e}", self.name),
                format!("{field}.code"),
            ))
        })?;
        let data = hex::decode(self.data.trim()).map_err(|e| {
            HalldyllError::Config(ConfigError::validation(
                format!("Contract '{}' data is not valid hex: {e}", self.name),
                format!("{field}.data"),
            ))
        })?;
        let amount = Amount::parse_coins(&self.amount).map_err(|e| {
            HalldyllError::Config(ConfigError::validation(
                format!("Contract '{}': {e}", self.name),
                format!("{field}.amount"),
            ))
        })?;

        Ok(ContractDefinition {
            name: self.name.clone(),
            state_init: StateInit { code, data },
            workchain: self.workchain,
            amount,
            priority: self.priority,
            payload: self.payload.clone(),
            description: self.description.clone(),
        })
    }
}

impl ConfirmationConfig {
    /// Converts to poller settings.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_attempts: self.max_attempts,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            total_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl std::fmt::Display for BalanceCheckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Blocking => "blocking",
            Self::Advisory => "advisory",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(code: &str, amount: &str) -> ContractConfig {
        ContractConfig {
            name: String::from("vault"),
            code: code.to_string(),
            data: String::from("00ff"),
            workchain: 0,
            amount: amount.to_string(),
            priority: Priority::Critical,
            payload: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_contract_decode() {
        let def = contract("b5ee9c72", "0.5").decode("contracts[0]").expect("decode");
        assert_eq!(def.state_init.code, vec![0xb5, 0xee, 0x9c, 0x72]);
        assert_eq!(def.state_init.data, vec![0x00, 0xff]);
        assert_eq!(def.amount.as_nano(), 500_000_000);
    }

    #[test]
    fn test_contract_decode_names_the_field() {
        let err = contract("xyz", "0.5").decode("contracts[2]").expect_err("bad hex");
        assert!(matches!(
            err,
            HalldyllError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "contracts[2].code"
        ));

        let err = contract("aa", "lots").decode("contracts[0]").expect_err("bad amount");
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_confirmation_defaults() {
        let settings = ConfirmationConfig::default().poll_settings();
        assert_eq!(settings, PollSettings::default());
    }
}
