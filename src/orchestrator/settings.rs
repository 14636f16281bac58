//! Run settings.

use std::time::Duration;

use crate::config::{BalanceCheckPolicy, DeployConfig};
use crate::error::Result;
use crate::ledger::{Amount, CostEstimate, PollSettings};
use crate::planner::ContractDefinition;
use crate::wallet::DEFAULT_VALID_FOR_SECS;

/// Knobs that shape a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Project name recorded in the report.
    pub project: String,
    /// Network label recorded in the report.
    pub network: String,
    /// Confirmation polling budget.
    pub poll: PollSettings,
    /// Whether an unreachable ledger blocks the balance step.
    pub balance_policy: BalanceCheckPolicy,
    /// Fee reserved per contract on top of its amount.
    pub fee_reserve: Amount,
    /// Validity window of deployment messages.
    pub valid_for: Duration,
    /// Pause after each deployment.
    pub pacing: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            project: String::from("unnamed"),
            network: String::from("testnet"),
            poll: PollSettings::default(),
            balance_policy: BalanceCheckPolicy::Blocking,
            fee_reserve: Amount::from_nano(50_000_000),
            valid_for: Duration::from_secs(DEFAULT_VALID_FOR_SECS),
            pacing: Duration::ZERO,
        }
    }
}

impl RunSettings {
    /// Builds settings from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the fee reserve is malformed.
    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        Ok(Self {
            project: config.project.name.clone(),
            network: config.project.environment.clone(),
            poll: config.confirmation.poll_settings(),
            balance_policy: config.policy.balance_check,
            fee_reserve: config.fee_reserve()?,
            valid_for: Duration::from_secs(config.wallet.valid_for_secs),
            pacing: Duration::from_millis(config.policy.pacing_ms),
        })
    }

    /// Estimates the cost of deploying `contracts`.
    #[must_use]
    pub fn estimate(&self, contracts: &[ContractDefinition]) -> CostEstimate {
        contracts.iter().fold(CostEstimate::new(), |mut estimate, c| {
            estimate.add(c.name.clone(), c.amount, self.fee_reserve);
            estimate
        })
    }
}
