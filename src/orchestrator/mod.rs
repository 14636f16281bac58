//! Deployment orchestration.
//!
//! This module ties the planner, the ledger, and the wallet together: the
//! [`DeploymentOrchestrator`] runs a plan over a fresh [`RunContext`] and
//! reports progress to a [`ProgressObserver`].

mod actions;
mod context;
mod engine;
mod observer;
mod settings;

pub use actions::RunActions;
pub use context::RunContext;
pub use engine::{DeploymentOrchestrator, RunFailure};
pub use observer::{NoopObserver, ProgressObserver, TracingObserver};
pub use settings::RunSettings;
