//! Deployment orchestration.
//!
//! The orchestrator runs the phases of a plan strictly in order over one
//! [`RunContext`] and turns the final snapshot into a [`DeploymentReport`].
//! A halted run still yields its report through [`RunFailure`], so confirmed
//! addresses are never lost.

use thiserror::Error;
use tracing::{error, info};

use crate::error::DeployError;
use crate::ledger::{Address, Clock, LedgerApi};
use crate::planner::{ContractDefinition, DeploymentPlan, PhaseRunner, StepExecutor};
use crate::state::{DeploymentReport, ReportInput, generate_deployment_id};
use crate::wallet::Signer;

use super::actions::RunActions;
use super::context::RunContext;
use super::observer::ProgressObserver;
use super::settings::RunSettings;

/// A run that halted on an escalated failure.
#[derive(Debug, Clone, Error)]
#[error("Run halted in phase '{phase}' at step '{step}': {error}")]
pub struct RunFailure {
    /// Best-effort report of the halted run.
    pub report: Box<DeploymentReport>,
    /// Phase that failed.
    pub phase: String,
    /// Step that failed.
    pub step: String,
    /// The escalated failure.
    pub error: DeployError,
}

/// Runs deployment plans against a ledger.
pub struct DeploymentOrchestrator<'a> {
    plan: DeploymentPlan,
    ledger: &'a dyn LedgerApi,
    clock: &'a dyn Clock,
    contracts: Vec<ContractDefinition>,
    settings: RunSettings,
}

impl<'a> DeploymentOrchestrator<'a> {
    /// Creates an orchestrator for a plan and the contracts it deploys.
    #[must_use]
    pub const fn new(
        plan: DeploymentPlan,
        ledger: &'a dyn LedgerApi,
        clock: &'a dyn Clock,
        contracts: Vec<ContractDefinition>,
        settings: RunSettings,
    ) -> Self {
        Self {
            plan,
            ledger,
            clock,
            contracts,
            settings,
        }
    }

    /// Returns the plan as built, untouched by any run.
    #[must_use]
    pub const fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Returns the run settings.
    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs the orchestrator's own plan.
    ///
    /// # Errors
    ///
    /// See [`DeploymentOrchestrator::execute_plan`].
    pub async fn execute(
        &self,
        funding_address: Address,
        signer: Option<&dyn Signer>,
        observer: &dyn ProgressObserver,
    ) -> Result<DeploymentReport, RunFailure> {
        self.execute_plan(&self.plan, funding_address, signer, observer)
            .await
    }

    /// Runs a plan from a fresh pending copy.
    ///
    /// Phases run in declared order and the first escalated failure halts the
    /// run; later phases stay pending.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the best-effort report when a phase
    /// aborts.
    pub async fn execute_plan(
        &self,
        plan: &DeploymentPlan,
        funding_address: Address,
        signer: Option<&dyn Signer>,
        observer: &dyn ProgressObserver,
    ) -> Result<DeploymentReport, RunFailure> {
        let started_at = self.clock.now();
        let deployment_id = generate_deployment_id(started_at);
        info!(
            "Starting deployment {deployment_id} of '{}' on {} ({} phases, {} steps)",
            self.settings.project,
            self.settings.network,
            plan.phases.len(),
            plan.step_count()
        );

        let mut run = plan.pending_copy();
        let mut ctx = RunContext::new(funding_address);

        let actions = RunActions::new(
            self.ledger,
            self.clock,
            signer,
            &self.contracts,
            &self.settings,
        );
        let runner = PhaseRunner::new(
            StepExecutor::new(&actions, self.clock, observer),
            self.clock,
            observer,
        );

        let mut failure = None;
        for phase in &mut run.phases {
            if let Err(abort) = runner.run(phase, &mut ctx).await {
                error!(
                    "Deployment {deployment_id} halted in phase '{}': {}",
                    phase.id, abort.error
                );
                failure = Some((phase.id.clone(), abort.step_id, abort.error));
                break;
            }
        }

        let finished_at = self.clock.now();
        let (resource_addresses, warnings) = ctx.into_parts();

        let report = DeploymentReport::assemble(ReportInput {
            deployment_id,
            project: self.settings.project.clone(),
            network: self.settings.network.clone(),
            funding_address,
            phases: run.phases,
            resource_addresses,
            warnings,
            started_at,
            finished_at,
            failure: failure.clone(),
        });
        info!("Deployment {} finished: {}", report.deployment_id, report.status);

        match failure {
            Some((phase, step, error)) => Err(RunFailure {
                report: Box::new(report),
                phase,
                step,
                error,
            }),
            None => Ok(report),
        }
    }
}
