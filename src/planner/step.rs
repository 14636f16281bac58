//! Step registry and single-step execution.
//!
//! Step ids resolve to a fixed set of [`StepAction`]s. The [`StepExecutor`]
//! drives one step through its state machine and reports every transition
//! to the run's observer.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::ledger::Clock;
use crate::orchestrator::{ProgressObserver, RunContext};

use super::plan::Step;
use super::resource::{DEPLOY_PREFIX, VERIFY_PREFIX};

/// Id of the wallet precondition step.
pub const CHECK_WALLET: &str = "check-wallet";

/// Id of the funding balance step.
pub const CHECK_BALANCE: &str = "check-balance";

/// Id of the definition validation step.
pub const VALIDATE_DEFINITIONS: &str = "validate-definitions";

/// Id of the finalization step.
pub const FINALIZE: &str = "finalize";

/// The work a step id resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Require a connected signer.
    CheckWallet,
    /// Compare the funding balance with the estimated cost.
    CheckBalance,
    /// Decode every contract and derive its address.
    ValidateDefinitions,
    /// Deploy the named contract and wait for confirmation.
    Deploy(String),
    /// Re-check a deployed contract.
    Verify(String),
    /// Summarise the run.
    Finalize,
}

impl StepAction {
    /// Resolves a step id.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` for ids outside the registry.
    pub fn resolve(id: &str) -> Result<Self, DeployError> {
        let action = match id {
            CHECK_WALLET => Self::CheckWallet,
            CHECK_BALANCE => Self::CheckBalance,
            VALIDATE_DEFINITIONS => Self::ValidateDefinitions,
            FINALIZE => Self::Finalize,
            _ => {
                if let Some(name) = id.strip_prefix(DEPLOY_PREFIX).filter(|n| !n.is_empty()) {
                    Self::Deploy(name.to_string())
                } else if let Some(name) = id.strip_prefix(VERIFY_PREFIX).filter(|n| !n.is_empty())
                {
                    Self::Verify(name.to_string())
                } else {
                    return Err(DeployError::UnknownStep { id: id.to_string() });
                }
            }
        };
        Ok(action)
    }

    /// Returns the contract this action targets, if any.
    #[must_use]
    pub fn contract(&self) -> Option<&str> {
        match self {
            Self::Deploy(name) | Self::Verify(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the canonical step id.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::CheckWallet => String::from(CHECK_WALLET),
            Self::CheckBalance => String::from(CHECK_BALANCE),
            Self::ValidateDefinitions => String::from(VALIDATE_DEFINITIONS),
            Self::Deploy(name) => format!("{DEPLOY_PREFIX}{name}"),
            Self::Verify(name) => format!("{VERIFY_PREFIX}{name}"),
            Self::Finalize => String::from(FINALIZE),
        }
    }

    /// Returns a default display title.
    #[must_use]
    pub fn default_title(&self) -> String {
        match self {
            Self::CheckWallet => String::from("Check wallet connection"),
            Self::CheckBalance => String::from("Check funding balance"),
            Self::ValidateDefinitions => String::from("Validate contract definitions"),
            Self::Deploy(name) => format!("Deploy {name}"),
            Self::Verify(name) => format!("Verify {name}"),
            Self::Finalize => String::from("Finalize deployment"),
        }
    }
}

/// Performs the work behind a resolved action.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Runs the action, returning the step result on success.
    async fn perform(&self, action: &StepAction, ctx: &mut RunContext)
    -> Result<String, DeployError>;
}

/// Runs one step through its state machine.
pub struct StepExecutor<'a> {
    handler: &'a dyn StepHandler,
    clock: &'a dyn Clock,
    observer: &'a dyn ProgressObserver,
}

impl<'a> StepExecutor<'a> {
    /// Creates a step executor.
    #[must_use]
    pub const fn new(
        handler: &'a dyn StepHandler,
        clock: &'a dyn Clock,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            handler,
            clock,
            observer,
        }
    }

    /// Executes a pending step.
    ///
    /// A step that is not pending is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the step's failure after recording it on the step.
    pub async fn execute(&self, step: &mut Step, ctx: &mut RunContext) -> Result<(), DeployError> {
        if let Err(e) = step.begin(self.clock.now()) {
            warn!("Skipping step '{}': {e}", step.id);
            return Ok(());
        }
        info!("Step '{}' started", step.id);
        self.observer.on_step_update(step);

        let outcome = match StepAction::resolve(&step.id) {
            Ok(action) => self.handler.perform(&action, ctx).await,
            Err(e) => Err(e),
        };

        let now = self.clock.now();
        match outcome {
            Ok(result) => {
                debug!("Step '{}' result: {result}", step.id);
                // Begin succeeded, so the step is in progress.
                let _ = step.complete(now, result);
                info!(
                    "Step '{}' completed in {}ms",
                    step.id,
                    step.actual_duration_ms.unwrap_or_default()
                );
                self.observer.on_step_update(step);
                Ok(())
            }
            Err(error) => {
                let _ = step.fail(now, &error);
                warn!("Step '{}' failed ({}): {error}", step.id, error.kind());
                self.observer.on_step_update(step);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::{Address, SimulatedClock};
    use crate::planner::{Priority, Status};
    use crate::testing::{RecordingObserver, ScriptedHandler};
    use std::time::Duration;

    fn ctx() -> RunContext {
        RunContext::new(Address::new(0, [1u8; 32]))
    }

    #[test]
    fn test_resolve_registry() {
        assert_eq!(StepAction::resolve("check-wallet"), Ok(StepAction::CheckWallet));
        assert_eq!(
            StepAction::resolve("deploy:registry"),
            Ok(StepAction::Deploy(String::from("registry")))
        );
        assert_eq!(
            StepAction::resolve("verify:registry").map(|a| a.id()),
            Ok(String::from("verify:registry"))
        );
        assert_eq!(
            StepAction::resolve("deploy:"),
            Err(DeployError::UnknownStep { id: String::from("deploy:") })
        );
        assert!(StepAction::resolve("launch-rockets").is_err());
    }

    #[tokio::test]
    async fn test_successful_step_records_result_and_duration() {
        let clock = SimulatedClock::new();
        let handler = ScriptedHandler::new().with_delay(&clock, Duration::from_millis(40));
        let observer = RecordingObserver::new();
        let executor = StepExecutor::new(&handler, &clock, &observer);

        let mut step = Step::new("finalize", "Finalize", Priority::Medium);
        executor.execute(&mut step, &mut ctx()).await.expect("ok");

        assert_eq!(step.status, Status::Completed);
        assert_eq!(step.actual_duration_ms, Some(40));
        assert_eq!(step.result.as_deref(), Some("finalize done"));
        assert_eq!(
            observer.step_events(),
            vec![
                (String::from("finalize"), Status::InProgress),
                (String::from("finalize"), Status::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_step_records_error_and_rethrows() {
        let clock = SimulatedClock::new();
        let handler =
            ScriptedHandler::new().failing("check-balance", DeployError::ledger_unreachable("down"));
        let observer = RecordingObserver::new();
        let executor = StepExecutor::new(&handler, &clock, &observer);

        let mut step = Step::new("check-balance", "Balance", Priority::High);
        let err = executor.execute(&mut step, &mut ctx()).await.expect_err("fails");

        assert_eq!(err.kind(), ErrorKind::LedgerUnreachable);
        assert_eq!(step.status, Status::Failed);
        assert!(step.actual_duration_ms.is_some());
        assert!(step.result.is_none());
        assert_eq!(step.error.map(|e| e.kind), Some(ErrorKind::LedgerUnreachable));
    }

    #[tokio::test]
    async fn test_unknown_step_fails_without_invoking_handler() {
        let clock = SimulatedClock::new();
        let handler = ScriptedHandler::new();
        let observer = RecordingObserver::new();
        let executor = StepExecutor::new(&handler, &clock, &observer);

        let mut step = Step::new("launch-rockets", "Launch", Priority::Medium);
        let err = executor.execute(&mut step, &mut ctx()).await.expect_err("unknown");

        assert_eq!(err.kind(), ErrorKind::UnknownStep);
        assert_eq!(step.status, Status::Failed);
        assert!(handler.performed().is_empty());
    }
}
