//! Configuration validation for contract deployments.
//!
//! This module checks a configuration before anything touches the ledger:
//! names, hex payloads, amounts, polling budget, and every id of an explicit
//! plan, so a bad step fails here rather than mid-run.

use crate::error::{ConfigError, HalldyllError, Result};
use crate::ledger::{Address, Amount, SUPPORTED_WORKCHAINS};
use crate::planner::{FINALIZE, StepAction};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{
    BalanceCheckPolicy, ConfirmationConfig, ContractConfig, DeployConfig, PhaseConfig,
    ProjectConfig,
};

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deployment configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first_error) => Err(HalldyllError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            })),
        }
    }

    /// Runs every check and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &DeployConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(&config.project, &mut result);
        Self::validate_network(config, &mut result);
        let names = Self::validate_contracts(&config.contracts, &mut result);
        Self::validate_confirmation(&config.confirmation, &mut result);
        Self::validate_policy(config, &mut result);
        if let Some(phases) = &config.phases {
            Self::validate_phases(phases, &names, &mut result);
        }

        result
    }

    /// Validates project configuration.
    fn validate_project(project: &ProjectConfig, result: &mut ValidationResult) {
        if project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            );
        }

        if project.environment.is_empty() {
            result.error("project.environment", "Environment cannot be empty");
        }
    }

    /// Validates the ledger endpoint and the funding wallet.
    fn validate_network(config: &DeployConfig, result: &mut ValidationResult) {
        let endpoint = config.network.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            result.error(
                "network.endpoint",
                format!("Ledger endpoint '{endpoint}' must be an http(s) URL"),
            );
        }

        if config.network.timeout_secs == 0 {
            result.error("network.timeout_secs", "Request timeout must be positive");
        }

        let funding = config.wallet.funding_address.trim();
        if funding.is_empty() {
            result.warnings.push(String::from(
                "wallet.funding_address: not set; provide it before running apply",
            ));
        } else if let Err(e) = funding.parse::<Address>() {
            result.error("wallet.funding_address", e.to_string());
        }

        if config.wallet.valid_for_secs == 0 {
            result.error("wallet.valid_for_secs", "Message validity must be positive");
        }
    }

    /// Validates all contract definitions and returns their names.
    fn validate_contracts<'c>(
        contracts: &'c [ContractConfig],
        result: &mut ValidationResult,
    ) -> HashSet<&'c str> {
        let mut seen_names = HashSet::new();

        if contracts.is_empty() {
            result.error("contracts", "At least one contract must be defined");
            return seen_names;
        }

        for (i, contract) in contracts.iter().enumerate() {
            let prefix = format!("contracts[{i}]");

            if !seen_names.insert(contract.name.as_str()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate contract name: {}", contract.name),
                );
            }

            if !is_valid_name(&contract.name) {
                result.error(
                    format!("{prefix}.name"),
                    format!(
                        "Contract name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        contract.name
                    ),
                );
            }

            match hex::decode(contract.code.trim()) {
                Ok(code) if code.is_empty() => {
                    result.error(format!("{prefix}.code"), "Contract code cannot be empty");
                }
                Ok(_) => {}
                Err(e) => result.error(
                    format!("{prefix}.code"),
                    format!("Contract code is not valid hex: {e}"),
                ),
            }

            if let Err(e) = hex::decode(contract.data.trim()) {
                result.error(
                    format!("{prefix}.data"),
                    format!("Contract data is not valid hex: {e}"),
                );
            }

            if !SUPPORTED_WORKCHAINS.contains(&contract.workchain) {
                result.error(
                    format!("{prefix}.workchain"),
                    format!(
                        "Unsupported workchain {}; expected one of {SUPPORTED_WORKCHAINS:?}",
                        contract.workchain
                    ),
                );
            }

            match Amount::parse_coins(&contract.amount) {
                Ok(amount) if amount.is_zero() => result.error(
                    format!("{prefix}.amount"),
                    "Deployment amount must be greater than zero",
                ),
                Ok(_) => {}
                Err(e) => result.error(format!("{prefix}.amount"), e.to_string()),
            }
        }

        seen_names
    }

    /// Validates the polling budget.
    fn validate_confirmation(confirmation: &ConfirmationConfig, result: &mut ValidationResult) {
        if confirmation.max_attempts == 0 {
            result.error("confirmation.max_attempts", "At least one attempt is required");
        }
        if confirmation.poll_interval_secs == 0 {
            result.error("confirmation.poll_interval_secs", "Poll interval must be positive");
        }
        if confirmation.timeout_secs == 0 {
            result.error("confirmation.timeout_secs", "Confirmation timeout must be positive");
        }

        let nominal = u64::from(confirmation.max_attempts)
            .saturating_mul(confirmation.poll_interval_secs);
        if nominal > 0 && nominal < confirmation.timeout_secs {
            result.warnings.push(format!(
                "confirmation: {} attempts every {}s give up after {nominal}s, before the {}s timeout",
                confirmation.max_attempts, confirmation.poll_interval_secs, confirmation.timeout_secs
            ));
        }
    }

    /// Validates the run policy.
    fn validate_policy(config: &DeployConfig, result: &mut ValidationResult) {
        match config.fee_reserve() {
            Ok(reserve) if reserve.is_zero() => result.warnings.push(String::from(
                "policy.fee_reserve: zero reserve; the balance check ignores network fees",
            )),
            Ok(_) => {}
            Err(_) => result.error(
                "policy.fee_reserve",
                format!("Invalid fee reserve '{}'", config.policy.fee_reserve),
            ),
        }

        if config.policy.balance_check == BalanceCheckPolicy::Advisory {
            result.warnings.push(String::from(
                "policy.balance_check: advisory; an unreachable ledger will not stop the run",
            ));
        }
    }

    /// Validates an explicit plan against the step registry.
    fn validate_phases(
        phases: &[PhaseConfig],
        contracts: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        if phases.is_empty() {
            result.error("phases", "An explicit plan needs at least one phase");
            return;
        }

        let mut phase_ids = HashSet::new();
        let mut step_ids = HashSet::new();
        let mut has_finalize = false;

        for (i, phase) in phases.iter().enumerate() {
            let prefix = format!("phases[{i}]");

            if !phase_ids.insert(phase.id.as_str()) {
                result.error(format!("{prefix}.id"), format!("Duplicate phase id: {}", phase.id));
            }
            if phase.steps.is_empty() {
                result
                    .warnings
                    .push(format!("{prefix}: phase '{}' has no steps", phase.id));
            }

            for (j, step) in phase.steps.iter().enumerate() {
                let field = format!("{prefix}.steps[{j}].id");

                if !step_ids.insert(step.id.as_str()) {
                    result.error(field.clone(), format!("Duplicate step id: {}", step.id));
                }

                match StepAction::resolve(&step.id) {
                    Ok(action) => {
                        has_finalize |= step.id == FINALIZE;
                        match action.contract() {
                            Some(name) if !contracts.contains(name) => result.error(
                                field,
                                format!("Step '{}' references unknown contract '{name}'", step.id),
                            ),
                            _ => {}
                        }
                    }
                    Err(e) => result.error(field, e.to_string()),
                }
            }
        }

        if !has_finalize {
            result
                .warnings
                .push(String::from("phases: explicit plan has no finalize step"));
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    // First character must be a letter
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    // Rest must be lowercase alphanumeric or hyphen
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
