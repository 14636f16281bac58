//! Deployment report types.
//!
//! A report is assembled once at the end of a run and never changes
//! afterwards. It is the only artifact this system persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{DeployError, ErrorKind, PreconditionError};
use crate::ledger::{Address, elapsed_between};
use crate::planner::{Phase, Status};

/// Current version of the report format.
pub const REPORT_VERSION: &str = "1.0";

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Every step of every phase completed.
    Success,
    /// Not everything completed, but some contracts were confirmed.
    Partial,
    /// Not everything completed and nothing was confirmed.
    Failed,
}

/// Where and why a run halted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureInfo {
    /// Phase that failed.
    pub phase: String,
    /// Step that failed.
    pub step: String,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Human-readable cause.
    pub message: String,
}

/// The summary artifact of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Report format version.
    pub version: String,
    /// Unique run identifier.
    pub deployment_id: String,
    /// Project name.
    pub project: String,
    /// Network label.
    pub network: String,
    /// Account that paid for the run.
    pub funding_address: Address,
    /// Overall outcome.
    pub status: ReportStatus,
    /// Final snapshot of every phase.
    pub phases: Vec<Phase>,
    /// Confirmed contract addresses by logical name.
    pub resource_addresses: BTreeMap<String, Address>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Run duration in milliseconds.
    pub total_duration_ms: u64,
    /// Non-fatal issues met during the run.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Escalated failure, if the run halted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    /// One-line human summary.
    pub summary: String,
    /// Suggested follow-up actions.
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Everything needed to assemble a report.
#[derive(Debug, Clone)]
pub struct ReportInput {
    /// Unique run identifier.
    pub deployment_id: String,
    /// Project name.
    pub project: String,
    /// Network label.
    pub network: String,
    /// Account that paid for the run.
    pub funding_address: Address,
    /// Final phase snapshot.
    pub phases: Vec<Phase>,
    /// Confirmed addresses.
    pub resource_addresses: BTreeMap<String, Address>,
    /// Run warnings.
    pub warnings: Vec<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Escalated failure with its phase and step.
    pub failure: Option<(String, String, DeployError)>,
}

impl ReportStatus {
    /// Derives the status from the final phases and confirmed addresses.
    #[must_use]
    pub fn derive(phases: &[Phase], addresses: &BTreeMap<String, Address>) -> Self {
        if phases.iter().all(Phase::all_steps_completed) {
            Self::Success
        } else if addresses.is_empty() {
            Self::Failed
        } else {
            Self::Partial
        }
    }
}

impl DeploymentReport {
    /// Assembles the report of a finished run.
    #[must_use]
    pub fn assemble(input: ReportInput) -> Self {
        let status = ReportStatus::derive(&input.phases, &input.resource_addresses);
        let total_duration_ms = u64::try_from(
            elapsed_between(input.started_at, input.finished_at).as_millis(),
        )
        .unwrap_or(u64::MAX);

        let (summary, next_steps) = describe(
            status,
            &input.phases,
            &input.resource_addresses,
            input.failure.as_ref().map(|(_, _, e)| e),
        );

        let failure = input.failure.map(|(phase, step, error)| FailureInfo {
            phase,
            step,
            kind: error.kind(),
            message: error.to_string(),
        });

        Self {
            version: String::from(REPORT_VERSION),
            deployment_id: input.deployment_id,
            project: input.project,
            network: input.network,
            funding_address: input.funding_address,
            status,
            phases: input.phases,
            resource_addresses: input.resource_addresses,
            started_at: input.started_at,
            finished_at: input.finished_at,
            total_duration_ms,
            warnings: input.warnings,
            failure,
            summary,
            next_steps,
        }
    }

    /// Returns the number of steps with the given status.
    #[must_use]
    pub fn count_steps(&self, status: Status) -> usize {
        self.phases.iter().map(|p| p.count(status)).sum()
    }

    /// Returns the total number of steps.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }

    /// Returns true if the run halted on a user decision rather than a fault.
    #[must_use]
    pub fn halted_by_user(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == ErrorKind::UserRejected)
    }
}

/// Generates a deployment id from the run start time.
#[must_use]
pub fn generate_deployment_id(started_at: DateTime<Utc>) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("dep-{}-{}", started_at.format("%Y%m%d%H%M%S"), &uuid[..8])
}

fn describe(
    status: ReportStatus,
    phases: &[Phase],
    addresses: &BTreeMap<String, Address>,
    failure: Option<&DeployError>,
) -> (String, Vec<String>) {
    let steps: usize = phases.iter().map(|p| p.steps.len()).sum();
    let completed: usize = phases.iter().map(|p| p.count(Status::Completed)).sum();
    let mut next_steps = Vec::new();

    let summary = match status {
        ReportStatus::Success => {
            next_steps.push(String::from(
                "Record the contract addresses in your application configuration",
            ));
            format!(
                "Deployment succeeded: {} contract(s) confirmed, {completed}/{steps} steps completed",
                addresses.len()
            )
        }
        ReportStatus::Partial => {
            next_steps.push(String::from(
                "Re-run apply; contracts already deployed are detected and skipped",
            ));
            format!(
                "Deployment partially succeeded: {} contract(s) confirmed, {completed}/{steps} steps completed",
                addresses.len()
            )
        }
        ReportStatus::Failed => format!(
            "Deployment failed: no contracts confirmed, {completed}/{steps} steps completed"
        ),
    };

    match failure {
        Some(DeployError::PreconditionFailed(PreconditionError::InsufficientBalance {
            shortfall,
            ..
        })) => next_steps.push(format!(
            "Top up the funding wallet with at least {shortfall} and re-run"
        )),
        Some(DeployError::PreconditionFailed(PreconditionError::WalletNotConnected)) => {
            next_steps.push(String::from("Connect the funding wallet through the wallet bridge"));
        }
        Some(DeployError::PreconditionFailed(PreconditionError::InvalidResourceDefinition {
            resource,
            ..
        })) => next_steps.push(format!("Fix the definition of '{resource}' and run validate")),
        Some(DeployError::UserRejected { .. }) => {
            next_steps.push(String::from("Approve the transaction in your wallet to continue"));
        }
        Some(DeployError::ConfirmationTimeout { address, .. }) => next_steps.push(format!(
            "Check {address} in an explorer before re-running; the message may still land"
        )),
        Some(DeployError::SubmissionTimeout { .. }) => {
            next_steps.push(String::from("Check the wallet bridge and re-run"));
        }
        Some(DeployError::LedgerUnreachable { .. }) => {
            next_steps.push(String::from("Check the ledger endpoint and API key, then re-run"));
        }
        Some(DeployError::UnknownStep { id }) => {
            next_steps.push(format!("Remove or correct step '{id}' in the plan"));
        }
        Some(DeployError::VerificationFailed { resource, .. }) => next_steps.push(format!(
            "Inspect '{resource}' on the ledger; it did not stay deployed"
        )),
        None => {}
    }

    (summary, next_steps)
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Amount;
    use crate::planner::{Priority, Step};

    fn finished_phase(id: &str, status: Status) -> Phase {
        let t0 = Utc::now();
        let mut phase = Phase::new(id, id).with_step(Step::new("finalize", "Finalize", Priority::Medium));
        phase.begin(t0).expect("begin");
        phase.steps[0].begin(t0).expect("begin");
        if status == Status::Completed {
            phase.steps[0].complete(t0, String::from("ok")).expect("complete");
        } else {
            phase.steps[0]
                .fail(t0, &DeployError::ledger_unreachable("down"))
                .expect("fail");
        }
        phase.finish(t0, status).expect("finish");
        phase
    }

    fn input(phases: Vec<Phase>, addresses: BTreeMap<String, Address>) -> ReportInput {
        let now = Utc::now();
        ReportInput {
            deployment_id: generate_deployment_id(now),
            project: String::from("catalogue"),
            network: String::from("testnet"),
            funding_address: Address::new(0, [1u8; 32]),
            phases,
            resource_addresses: addresses,
            warnings: Vec::new(),
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(1500),
            failure: None,
        }
    }

    #[test]
    fn test_status_derivation() {
        let mut addresses = BTreeMap::new();
        let done = vec![finished_phase("a", Status::Completed)];
        assert_eq!(ReportStatus::derive(&done, &addresses), ReportStatus::Success);

        let halted = vec![finished_phase("a", Status::Failed)];
        assert_eq!(ReportStatus::derive(&halted, &addresses), ReportStatus::Failed);

        addresses.insert(String::from("x"), Address::new(0, [2u8; 32]));
        assert_eq!(ReportStatus::derive(&halted, &addresses), ReportStatus::Partial);
    }

    #[test]
    fn test_pending_phase_is_not_success() {
        let phases = vec![
            finished_phase("a", Status::Completed),
            Phase::new("b", "b").with_step(Step::new("finalize", "Finalize", Priority::Medium)),
        ];
        assert_eq!(ReportStatus::derive(&phases, &BTreeMap::new()), ReportStatus::Failed);
    }

    #[test]
    fn test_insufficient_balance_next_step() {
        let mut input = input(vec![finished_phase("a", Status::Failed)], BTreeMap::new());
        input.failure = Some((
            String::from("verification"),
            String::from("check-balance"),
            PreconditionError::InsufficientBalance {
                required: Amount::from_nano(3_000_000_000),
                available: Amount::from_nano(1_000_000_000),
                shortfall: Amount::from_nano(2_000_000_000),
            }
            .into(),
        ));

        let report = DeploymentReport::assemble(input);
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.total_duration_ms, 1500);
        assert!(report.next_steps.iter().any(|s| s.contains("at least 2 ")));

        let failure = report.failure.expect("failure recorded");
        assert_eq!(failure.kind, ErrorKind::PreconditionFailed);
        assert_eq!(failure.step, "check-balance");
    }

    #[test]
    fn test_report_json_layout() {
        let mut addresses = BTreeMap::new();
        addresses.insert(String::from("registry"), Address::new(0, [2u8; 32]));
        let report = DeploymentReport::assemble(input(
            vec![finished_phase("a", Status::Completed)],
            addresses,
        ));

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["status"], "success");
        assert_eq!(
            json["resource_addresses"]["registry"],
            Address::new(0, [2u8; 32]).to_raw()
        );
        assert!(json.get("failure").is_none());

        let back: DeploymentReport = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, report);
    }

    #[test]
    fn test_deployment_id_format() {
        let id = generate_deployment_id(Utc::now());
        assert!(id.starts_with("dep-"));
        assert_eq!(id.len(), "dep-".len() + 14 + 1 + 8);
    }
}
