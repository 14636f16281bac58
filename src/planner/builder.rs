//! Plan construction.
//!
//! Builds either the default four-phase plan from the contract list or an
//! explicit plan written in the configuration.

use crate::config::{BalanceCheckPolicy, DeployConfig, PhaseConfig};

use super::plan::{DeploymentPlan, Phase, Priority, Step};
use super::resource::ContractDefinition;
use super::step::{StepAction, CHECK_BALANCE, CHECK_WALLET, FINALIZE, VALIDATE_DEFINITIONS};

/// Estimated seconds for a deployment step.
const DEPLOY_ESTIMATE_SECS: u64 = 30;

/// Builds deployment plans.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    contracts: &'a [ContractDefinition],
    balance_policy: BalanceCheckPolicy,
    verify_after_deploy: bool,
}

impl<'a> PlanBuilder<'a> {
    /// Creates a builder over the contracts to deploy.
    #[must_use]
    pub const fn new(contracts: &'a [ContractDefinition]) -> Self {
        Self {
            contracts,
            balance_policy: BalanceCheckPolicy::Blocking,
            verify_after_deploy: true,
        }
    }

    /// Sets the balance check policy.
    #[must_use]
    pub const fn balance_policy(mut self, policy: BalanceCheckPolicy) -> Self {
        self.balance_policy = policy;
        self
    }

    /// Sets whether a validation phase is added.
    #[must_use]
    pub const fn verify_after_deploy(mut self, verify: bool) -> Self {
        self.verify_after_deploy = verify;
        self
    }

    /// Builds the plan a configuration asks for.
    #[must_use]
    pub fn for_config(config: &DeployConfig, contracts: &'a [ContractDefinition]) -> DeploymentPlan {
        match &config.phases {
            Some(phases) => Self::explicit(phases),
            None => Self::new(contracts)
                .balance_policy(config.policy.balance_check)
                .verify_after_deploy(config.policy.verify_after_deploy)
                .build(),
        }
    }

    /// Builds the default plan.
    #[must_use]
    pub fn build(&self) -> DeploymentPlan {
        let balance_priority = match self.balance_policy {
            BalanceCheckPolicy::Blocking => Priority::Critical,
            BalanceCheckPolicy::Advisory => Priority::High,
        };

        let verification = Phase::new("verification", "Verification")
            .with_description("Check preconditions before spending anything")
            .with_step(
                Step::new(CHECK_WALLET, "Check wallet connection", Priority::Critical)
                    .with_description("A signer must be connected")
                    .with_estimate(1),
            )
            .with_step(
                Step::new(CHECK_BALANCE, "Check funding balance", balance_priority)
                    .with_description("Funding account must cover amounts and fees")
                    .with_estimate(2),
            )
            .with_step(
                Step::new(VALIDATE_DEFINITIONS, "Validate contract definitions", Priority::Critical)
                    .with_description("Every contract must derive an address")
                    .with_estimate(1),
            );

        let deployment = self.contracts.iter().fold(
            Phase::new("deployment", "Deployment")
                .with_description("Submit each contract and wait for confirmation"),
            |phase, contract| {
                phase.with_step(
                    Step::new(
                        contract.deploy_step_id(),
                        format!("Deploy {}", contract.name),
                        contract.priority,
                    )
                    .with_description(contract.description.clone())
                    .with_estimate(DEPLOY_ESTIMATE_SECS),
                )
            },
        );

        let mut phases = vec![verification, deployment];

        if self.verify_after_deploy {
            phases.push(self.contracts.iter().fold(
                Phase::new("validation", "Validation")
                    .with_description("Re-check every deployed contract"),
                |phase, contract| {
                    phase.with_step(
                        Step::new(
                            contract.verify_step_id(),
                            format!("Verify {}", contract.name),
                            Priority::High,
                        )
                        .with_estimate(2),
                    )
                },
            ));
        }

        phases.push(
            Phase::new("finalization", "Finalization")
                .with_description("Summarise the deployment")
                .with_step(
                    Step::new(FINALIZE, "Finalize deployment", Priority::Medium).with_estimate(1),
                ),
        );

        DeploymentPlan::new(phases)
    }

    /// Builds an explicit plan from configuration.
    ///
    /// Ids are not resolved here; unknown ids fail when the step runs.
    #[must_use]
    pub fn explicit(phases: &[PhaseConfig]) -> DeploymentPlan {
        DeploymentPlan::new(
            phases
                .iter()
                .map(|p| {
                    p.steps.iter().fold(
                        Phase::new(p.id.clone(), p.name.clone())
                            .with_description(p.description.clone()),
                        |phase, s| {
                            let title = s.title.clone().unwrap_or_else(|| {
                                StepAction::resolve(&s.id)
                                    .map_or_else(|_| s.id.clone(), |a| a.default_title())
                            });
                            let mut step = Step::new(s.id.clone(), title, s.priority)
                                .with_description(s.description.clone());
                            step.estimated_secs = s.estimated_secs;
                            phase.with_step(step)
                        },
                    )
                })
                .collect(),
        )
    }
}
