//! Deployment plan types.
//!
//! A plan is an ordered list of phases, each an ordered list of steps. The
//! structure is fixed once built; only status fields change during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DeployError, ErrorKind};

/// How a step failure escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Failure aborts the phase and the run.
    #[default]
    Critical,
    /// Failure is recorded and the phase continues.
    High,
    /// Failure is recorded and the phase continues.
    Medium,
}

/// Lifecycle status shared by steps and phases.
///
/// `Pending → InProgress → {Completed | Failed}`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not started.
    #[default]
    Pending,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
}

/// A rejected status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    /// Status before the attempted transition.
    pub from: Status,
    /// Requested status.
    pub to: Status,
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable cause.
    pub message: String,
}

/// The smallest unit of orchestrated work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Identifier resolved against the step registry.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Escalation policy.
    pub priority: Priority,
    /// Current status.
    #[serde(default)]
    pub status: Status,
    /// Expected duration in seconds, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_secs: Option<u64>,
    /// Measured duration in milliseconds; set only once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_ms: Option<u64>,
    /// When the step started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the step reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Outcome payload; present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure cause; present only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

/// An ordered, named group of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Current status.
    #[serde(default)]
    pub status: Status,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// When the phase started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// An ordered sequence of phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Phases in execution order.
    pub phases: Vec<Phase>,
}

impl Status {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn check(self, to: Self) -> Result<(), TransitionError> {
        let allowed = match to {
            Self::InProgress => self == Self::Pending,
            Self::Completed | Self::Failed => self == Self::InProgress,
            Self::Pending => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl Step {
    /// Creates a pending step.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            priority,
            status: Status::Pending,
            estimated_secs: None,
            actual_duration_ms: None,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the estimated duration.
    #[must_use]
    pub const fn with_estimate(mut self, secs: u64) -> Self {
        self.estimated_secs = Some(secs);
        self
    }

    /// Moves the step to `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the step is pending.
    pub fn begin(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status.check(Status::InProgress)?;
        self.status = Status::InProgress;
        self.started_at = Some(at);
        Ok(())
    }

    /// Moves the step to `Completed` with a result.
    ///
    /// # Errors
    ///
    /// Returns an error unless the step is in progress.
    pub fn complete(&mut self, at: DateTime<Utc>, result: String) -> Result<(), TransitionError> {
        self.status.check(Status::Completed)?;
        self.finish(at, Status::Completed);
        self.result = Some(result);
        Ok(())
    }

    /// Moves the step to `Failed` with the cause.
    ///
    /// # Errors
    ///
    /// Returns an error unless the step is in progress.
    pub fn fail(&mut self, at: DateTime<Utc>, error: &DeployError) -> Result<(), TransitionError> {
        self.status.check(Status::Failed)?;
        self.finish(at, Status::Failed);
        self.error = Some(StepError {
            kind: error.kind(),
            message: error.to_string(),
        });
        Ok(())
    }

    fn finish(&mut self, at: DateTime<Utc>, status: Status) {
        self.status = status;
        self.finished_at = Some(at);
        let elapsed = self
            .started_at
            .map_or(0, |start| (at - start).num_milliseconds().max(0));
        self.actual_duration_ms = Some(u64::try_from(elapsed).unwrap_or(0));
    }

    /// Returns true if a failure of this step aborts its phase.
    #[must_use]
    pub fn escalates(&self, error: &DeployError) -> bool {
        self.priority == Priority::Critical || error.always_critical()
    }

    /// Returns a copy with every runtime field cleared.
    #[must_use]
    pub fn pending_copy(&self) -> Self {
        Self {
            status: Status::Pending,
            actual_duration_ms: None,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            ..self.clone()
        }
    }
}

impl Phase {
    /// Creates a pending phase with no steps.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            status: Status::Pending,
            steps: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Moves the phase to `InProgress`.
    ///
    /// # Errors
    ///
    /// Returns an error unless the phase is pending.
    pub fn begin(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status.check(Status::InProgress)?;
        self.status = Status::InProgress;
        self.started_at = Some(at);
        Ok(())
    }

    /// Moves the phase to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns an error unless the phase is in progress and `status` is terminal.
    pub fn finish(&mut self, at: DateTime<Utc>, status: Status) -> Result<(), TransitionError> {
        self.status.check(status)?;
        self.status = status;
        self.finished_at = Some(at);
        Ok(())
    }

    /// Returns true if every step completed.
    #[must_use]
    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == Status::Completed)
    }

    /// Returns the number of steps with the given status.
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Returns a copy with every runtime field cleared.
    #[must_use]
    pub fn pending_copy(&self) -> Self {
        Self {
            status: Status::Pending,
            steps: self.steps.iter().map(Step::pending_copy).collect(),
            started_at: None,
            finished_at: None,
            ..self.clone()
        }
    }
}

impl DeploymentPlan {
    /// Creates a plan from phases.
    #[must_use]
    pub const fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }

    /// Iterates over every step in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.phases.iter().flat_map(|p| p.steps.iter())
    }

    /// Finds a step by id.
    #[must_use]
    pub fn find_step(&self, id: &str) -> Option<&Step> {
        self.steps().find(|s| s.id == id)
    }

    /// Returns a copy with every phase and step reset to pending.
    #[must_use]
    pub fn pending_copy(&self) -> Self {
        Self {
            phases: self.phases.iter().map(Phase::pending_copy).collect(),
        }
    }

    /// Returns the sum of the step estimates in seconds.
    #[must_use]
    pub fn estimated_secs(&self) -> u64 {
        self.steps().filter_map(|s| s.estimated_secs).sum()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Deployment Plan ({} phases, {} steps):",
            self.phases.len(),
            self.step_count()
        )?;
        for (i, phase) in self.phases.iter().enumerate() {
            writeln!(f, "  {}. {} [{}]", i + 1, phase.name, phase.status)?;
            for step in &phase.steps {
                writeln!(f, "     - {} ({}) [{}]", step.id, step.priority, step.status)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_step_lifecycle() {
        let t0 = Utc::now();
        let mut step = Step::new("check-wallet", "Check wallet", Priority::Critical);

        step.begin(t0).expect("begin");
        assert_eq!(step.status, Status::InProgress);
        assert!(step.actual_duration_ms.is_none());

        step.complete(t0 + Duration::milliseconds(250), String::from("ok"))
            .expect("complete");
        assert_eq!(step.status, Status::Completed);
        assert_eq!(step.actual_duration_ms, Some(250));
        assert_eq!(step.result.as_deref(), Some("ok"));
        assert!(step.error.is_none());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let t0 = Utc::now();
        let mut step = Step::new("finalize", "Finalize", Priority::Medium);
        step.begin(t0).expect("begin");
        step.fail(t0, &DeployError::UnknownStep { id: String::from("x") })
            .expect("fail");

        assert!(step.begin(t0).is_err());
        assert!(step.complete(t0, String::new()).is_err());
        assert!(step.fail(t0, &DeployError::ledger_unreachable("x")).is_err());
        assert_eq!(step.status, Status::Failed);
        assert!(step.result.is_none());
        assert_eq!(
            step.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::UnknownStep)
        );
    }

    #[test]
    fn test_pending_step_cannot_finish() {
        let mut step = Step::new("finalize", "Finalize", Priority::Medium);
        let err = step.complete(Utc::now(), String::new()).expect_err("not started");
        assert_eq!(err.from, Status::Pending);
        assert!(step.actual_duration_ms.is_none());
    }

    #[test]
    fn test_escalation_rule() {
        let high = Step::new("check-balance", "Balance", Priority::High);
        assert!(!high.escalates(&DeployError::ledger_unreachable("down")));
        assert!(high.escalates(&DeployError::UnknownStep { id: String::from("x") }));

        let critical = Step::new("deploy:a", "Deploy", Priority::Critical);
        assert!(critical.escalates(&DeployError::ledger_unreachable("down")));
    }

    #[test]
    fn test_pending_copy_resets_runtime_fields() {
        let t0 = Utc::now();
        let mut phase = Phase::new("verification", "Verification")
            .with_step(Step::new("check-wallet", "Wallet", Priority::Critical));
        phase.begin(t0).expect("begin");
        phase.steps[0].begin(t0).expect("begin");
        phase.steps[0].complete(t0, String::from("ok")).expect("complete");
        phase.finish(t0, Status::Completed).expect("finish");

        let plan = DeploymentPlan::new(vec![phase]).pending_copy();
        let step = plan.find_step("check-wallet").expect("step");
        assert_eq!(plan.phases[0].status, Status::Pending);
        assert_eq!(step.status, Status::Pending);
        assert!(step.result.is_none());
        assert!(step.started_at.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
        let priority: Priority = serde_json::from_str("\"high\"").expect("parse");
        assert_eq!(priority, Priority::High);
    }
}
