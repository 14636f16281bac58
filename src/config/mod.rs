//! Configuration module for Halldyll contract deployments.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `halldyll.contracts.yaml`
//! - Environment and `.env` overrides
//! - Validation of contracts, polling budget, policy, and explicit plans

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_FUNDING_ADDRESS, ENV_LEDGER_API_KEY,
    ENV_LEDGER_ENDPOINT, ENV_WALLET_BRIDGE, apply_overrides, find_config_file,
};
pub use spec::{
    BalanceCheckPolicy, ConfirmationConfig, ContractConfig, DEFAULT_REPORT_DIR, DeployConfig,
    NetworkConfig, PhaseConfig, PolicyConfig, ProjectConfig, StateConfig, StepConfig,
    WalletConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
