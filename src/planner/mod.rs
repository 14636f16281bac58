//! Planning module for contract deployments.
//!
//! This module defines the plan data model (phases, steps, statuses), builds
//! plans from configuration, and executes single steps and phases.

mod builder;
mod phase;
mod plan;
mod resource;
mod step;

pub use builder::PlanBuilder;
pub use phase::{PhaseAbort, PhaseRunner};
pub use plan::{DeploymentPlan, Phase, Priority, Status, Step, StepError, TransitionError};
pub use resource::{ContractDefinition, DEPLOY_PREFIX, VERIFY_PREFIX};
pub use step::{
    StepAction, StepExecutor, StepHandler, CHECK_BALANCE, CHECK_WALLET, FINALIZE,
    VALIDATE_DEFINITIONS,
};
