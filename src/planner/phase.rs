//! Sequential execution of one phase.

use tracing::{error, info, warn};

use crate::error::DeployError;
use crate::ledger::Clock;
use crate::orchestrator::{ProgressObserver, RunContext};

use super::plan::{Phase, Status};
use super::step::StepExecutor;

/// A failure that aborted a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseAbort {
    /// Id of the step that failed.
    pub step_id: String,
    /// The step's failure.
    pub error: DeployError,
}

/// Runs the steps of a phase strictly in declared order.
pub struct PhaseRunner<'a> {
    executor: StepExecutor<'a>,
    clock: &'a dyn Clock,
    observer: &'a dyn ProgressObserver,
}

impl<'a> PhaseRunner<'a> {
    /// Creates a phase runner.
    #[must_use]
    pub const fn new(
        executor: StepExecutor<'a>,
        clock: &'a dyn Clock,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            executor,
            clock,
            observer,
        }
    }

    /// Runs every step of the phase.
    ///
    /// A failing step aborts the phase when it is critical or its failure is
    /// always critical; remaining steps then stay pending. Other failures are
    /// recorded on the step and the phase moves on.
    ///
    /// A phase whose only failures were non-critical still finishes
    /// `Completed`: its status says the phase was not aborted. The failed steps
    /// keep their `Failed` status, so the report can never derive `Success`
    /// from such a phase.
    ///
    /// # Errors
    ///
    /// Returns the escalated failure after marking the phase failed.
    pub async fn run(&self, phase: &mut Phase, ctx: &mut RunContext) -> Result<(), PhaseAbort> {
        if let Err(e) = phase.begin(self.clock.now()) {
            warn!("Skipping phase '{}': {e}", phase.id);
            return Ok(());
        }
        info!("Phase '{}' started ({} steps)", phase.name, phase.steps.len());
        self.observer.on_phase_update(phase);

        let mut abort = None;
        for step in &mut phase.steps {
            if let Err(error) = self.executor.execute(step, ctx).await {
                if step.escalates(&error) {
                    error!("Critical step '{}' failed; aborting phase '{}'", step.id, phase.id);
                    abort = Some(PhaseAbort {
                        step_id: step.id.clone(),
                        error,
                    });
                    break;
                }
                warn!("Non-critical step '{}' failed, continuing: {error}", step.id);
                ctx.warn(format!("{} failed: {error}", step.id));
            }
        }

        let status = if abort.is_some() {
            Status::Failed
        } else {
            Status::Completed
        };
        // Begin succeeded, so the phase is in progress.
        let _ = phase.finish(self.clock.now(), status);
        info!("Phase '{}' {status}", phase.name);
        self.observer.on_phase_update(phase);

        abort.map_or(Ok(()), Err)
    }
}
