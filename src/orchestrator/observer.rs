//! Progress reporting.

use tracing::{info, warn};

use crate::planner::{Phase, Status, Step};

/// Receives phase and step transitions as they happen.
///
/// Callbacks run synchronously on the run's control flow and must return
/// quickly.
pub trait ProgressObserver: Send + Sync {
    /// Called after every phase transition.
    fn on_phase_update(&self, phase: &Phase);

    /// Called after every step transition.
    fn on_step_update(&self, step: &Step);
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_phase_update(&self, _phase: &Phase) {}

    fn on_step_update(&self, _step: &Step) {}
}

/// Observer that logs every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_phase_update(&self, phase: &Phase) {
        info!(
            phase = %phase.id,
            status = %phase.status,
            completed = phase.count(Status::Completed),
            total = phase.steps.len(),
            "phase update"
        );
    }

    fn on_step_update(&self, step: &Step) {
        match (&step.status, &step.error) {
            (Status::Failed, Some(error)) => warn!(
                step = %step.id,
                kind = %error.kind,
                "step failed: {}",
                error.message
            ),
            _ => info!(
                step = %step.id,
                status = %step.status,
                duration_ms = step.actual_duration_ms,
                "step update"
            ),
        }
    }
}
