//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{DeployConfig, ValidationResult};
use crate::ledger::{Address, BalanceCheck, CostEstimate};
use crate::planner::{DeploymentPlan, Status};
use crate::state::{DeploymentReport, ReportStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan step row for table display.
#[derive(Tabled)]
struct PlanStepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Est.")]
    estimate: String,
}

/// Report step row for table display.
#[derive(Tabled)]
struct ReportStepRow {
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// Contract address row for table display.
#[derive(Tabled)]
struct AddressRow {
    #[tabled(rename = "Contract")]
    contract: String,
    #[tabled(rename = "Address")]
    address: String,
}

/// Report list row for table display.
#[derive(Tabled)]
struct ReportListRow {
    #[tabled(rename = "Deployment")]
    id: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Contracts")]
    contracts: usize,
    #[tabled(rename = "Steps")]
    steps: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns the output format.
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Formats a deployment plan with derived addresses and estimated cost.
    #[must_use]
    pub fn format_plan(
        &self,
        plan: &DeploymentPlan,
        addresses: &[(String, Address)],
        estimate: &CostEstimate,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson {
                plan,
                addresses: addresses
                    .iter()
                    .map(|(name, address)| AddressJson {
                        contract: name,
                        address: address.to_raw(),
                    })
                    .collect(),
                estimate,
                total: estimate.total().to_string(),
            }),
            OutputFormat::Text => Self::format_plan_text(plan, addresses, estimate),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(
        plan: &DeploymentPlan,
        addresses: &[(String, Address)],
        estimate: &CostEstimate,
    ) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\n📋 Deployment Plan\n");

        let mut index = 0;
        let rows: Vec<PlanStepRow> = plan
            .phases
            .iter()
            .flat_map(|phase| phase.steps.iter().map(move |step| (phase, step)))
            .map(|(phase, step)| {
                index += 1;
                PlanStepRow {
                    index,
                    phase: phase.name.clone(),
                    step: step.title.clone(),
                    priority: step.priority.to_string(),
                    estimate: step
                        .estimated_secs
                        .map_or_else(|| String::from("-"), |s| format!("{s}s")),
                }
            })
            .collect();

        if rows.is_empty() {
            output.push_str("   Plan has no steps.\n");
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !addresses.is_empty() {
            output.push_str("\nContract addresses:\n");
            output.push_str(&Self::address_table(addresses));
            output.push('\n');
        }

        let _ = write!(
            output,
            "\nPlan: {} phases, {} steps, ~{}s\n",
            plan.phases.len(),
            plan.step_count(),
            plan.estimated_secs()
        );
        let _ = writeln!(
            output,
            "Estimated cost: {} (including {} reserved for fees)",
            estimate.total().to_string().yellow(),
            estimate.total_fees()
        );

        output
    }

    /// Formats contract addresses.
    #[must_use]
    pub fn format_addresses(&self, addresses: &[(String, Address)]) -> String {
        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = addresses
                    .iter()
                    .map(|(name, address)| (name.clone(), address.to_raw().into()))
                    .collect();
                to_json(&map)
            }
            OutputFormat::Text => {
                if addresses.is_empty() {
                    return String::from("No contracts defined.\n");
                }
                let mut output = Self::address_table(addresses);
                output.push('\n');
                output
            }
        }
    }

    /// Formats a funding balance check.
    #[must_use]
    pub fn format_balance(
        &self,
        funding: &Address,
        check: &BalanceCheck,
        estimate: &CostEstimate,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&BalanceJson {
                funding_address: funding.to_raw(),
                check,
                estimate,
            }),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n💰 Funding wallet: {funding}\n");
                for line in &estimate.lines {
                    let _ = writeln!(
                        output,
                        "   {:<24} {} + {} fee",
                        line.resource, line.amount, line.fee
                    );
                }
                let _ = writeln!(output, "\n   Required:  {}", check.required);
                let _ = writeln!(output, "   Available: {}", check.available);

                match check.shortfall {
                    None => {
                        let _ = writeln!(output, "\n{} Balance is sufficient", "✓".green());
                    }
                    Some(shortfall) => {
                        let _ = writeln!(
                            output,
                            "\n{} Balance is short by {}",
                            "✗".red(),
                            shortfall.to_string().red()
                        );
                    }
                }
                output
            }
        }
    }

    /// Formats a deployment report.
    #[must_use]
    pub fn format_report(&self, report: &DeploymentReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &DeploymentReport) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\n📦 Deployment {} ({}/{})\n\n",
            report.deployment_id, report.project, report.network
        );

        let rows: Vec<ReportStepRow> = report
            .phases
            .iter()
            .flat_map(|phase| phase.steps.iter().map(move |step| (phase, step)))
            .map(|(phase, step)| ReportStepRow {
                phase: phase.name.clone(),
                step: step.title.clone(),
                status: Self::format_step_status(step.status),
                duration: step
                    .actual_duration_ms
                    .map_or_else(|| String::from("-"), |ms| format!("{ms}ms")),
                outcome: Self::truncate(
                    step.result
                        .as_deref()
                        .or_else(|| step.error.as_ref().map(|e| e.message.as_str()))
                        .unwrap_or(""),
                    60,
                ),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !report.resource_addresses.is_empty() {
            output.push_str("\nConfirmed contracts:\n");
            let addresses: Vec<(String, Address)> = report
                .resource_addresses
                .iter()
                .map(|(name, address)| (name.clone(), *address))
                .collect();
            output.push_str(&Self::address_table(&addresses));
            output.push('\n');
        }

        if !report.warnings.is_empty() {
            let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
            for warning in &report.warnings {
                let _ = writeln!(output, "   - {warning}");
            }
        }

        if let Some(failure) = &report.failure {
            let marker = if report.halted_by_user() {
                "⚠".yellow()
            } else {
                "✗".red()
            };
            let _ = write!(
                output,
                "\n{marker} Halted in {} at {} ({}): {}\n",
                failure.phase, failure.step, failure.kind, failure.message
            );
        }

        let _ = write!(
            output,
            "\nStatus: {} in {}ms\n{}\n",
            Self::format_report_status(report.status),
            report.total_duration_ms,
            report.summary
        );

        if !report.next_steps.is_empty() {
            output.push_str("\nNext steps:\n");
            for step in &report.next_steps {
                let _ = writeln!(output, "   - {step}");
            }
        }

        output
    }

    /// Formats a list of stored reports.
    #[must_use]
    pub fn format_report_list(&self, reports: &[DeploymentReport]) -> String {
        match self.format {
            OutputFormat::Json => to_json(
                &reports
                    .iter()
                    .map(|r| ReportSummaryJson {
                        deployment_id: &r.deployment_id,
                        status: r.status,
                        started_at: r.started_at.to_rfc3339(),
                        contracts: r.resource_addresses.len(),
                    })
                    .collect::<Vec<_>>(),
            ),
            OutputFormat::Text => {
                if reports.is_empty() {
                    return String::from("No deployments recorded.\n");
                }
                let rows: Vec<ReportListRow> = reports
                    .iter()
                    .map(|r| ReportListRow {
                        id: r.deployment_id.clone(),
                        started: r.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        status: Self::format_report_status(r.status),
                        contracts: r.resource_addresses.len(),
                        steps: format!("{}/{}", r.count_steps(Status::Completed), r.total_steps()),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a validation result with a configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &DeployConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                valid: result.is_valid(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: &result.warnings,
            }),
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Configuration has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Project: {}", config.project.name);
                let _ = writeln!(output, "   Environment: {}", config.project.environment);
                let _ = writeln!(output, "   Contracts: {}", config.contract_names().join(", "));
                let _ = writeln!(output, "   Balance check: {}", config.policy.balance_check);
                let _ = writeln!(
                    output,
                    "   Plan: {}",
                    if config.phases.is_some() { "explicit" } else { "default" }
                );
                output
            }
        }
    }

    fn address_table(addresses: &[(String, Address)]) -> String {
        let rows: Vec<AddressRow> = addresses
            .iter()
            .map(|(name, address)| AddressRow {
                contract: name.clone(),
                address: address.to_raw(),
            })
            .collect();
        Table::new(rows).to_string()
    }

    /// Formats a step status with color.
    fn format_step_status(status: Status) -> String {
        match status {
            Status::Completed => "completed".green().to_string(),
            Status::Failed => "failed".red().to_string(),
            Status::InProgress => "in progress".yellow().to_string(),
            Status::Pending => "pending".dimmed().to_string(),
        }
    }

    /// Formats a report status with color.
    fn format_report_status(status: ReportStatus) -> String {
        match status {
            ReportStatus::Success => "success".green().to_string(),
            ReportStatus::Partial => "partial".yellow().to_string(),
            ReportStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    plan: &'a DeploymentPlan,
    addresses: Vec<AddressJson<'a>>,
    estimate: &'a CostEstimate,
    total: String,
}

#[derive(Serialize)]
struct AddressJson<'a> {
    contract: &'a str,
    address: String,
}

#[derive(Serialize)]
struct BalanceJson<'a> {
    funding_address: String,
    check: &'a BalanceCheck,
    estimate: &'a CostEstimate,
}

#[derive(Serialize)]
struct ReportSummaryJson<'a> {
    deployment_id: &'a str,
    status: ReportStatus,
    started_at: String,
    contracts: usize,
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    errors: Vec<String>,
    warnings: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Amount;
    use crate::planner::PlanBuilder;
    use crate::testing::contract;

    fn estimate() -> CostEstimate {
        let mut estimate = CostEstimate::new();
        estimate.add("registry", Amount::from_nano(100_000_000), Amount::from_nano(50_000_000));
        estimate
    }

    #[test]
    fn test_plan_text_lists_every_step() {
        colored::control::set_override(false);
        let contracts = vec![contract("registry")];
        let plan = PlanBuilder::new(&contracts).build();
        let addresses = vec![(String::from("registry"), Address::new(0, [7u8; 32]))];

        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&plan, &addresses, &estimate());

        assert!(text.contains("Deploy registry"));
        assert!(text.contains("Finalize deployment"));
        assert!(text.contains(&Address::new(0, [7u8; 32]).to_raw()));
        assert!(text.contains("Estimated cost: 0.15"));
    }

    #[test]
    fn test_plan_json_is_parseable() {
        let contracts = vec![contract("registry")];
        let plan = PlanBuilder::new(&contracts).build();

        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan, &[], &estimate());
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["total"], "0.15");
        assert_eq!(value["plan"]["phases"][0]["id"], "verification");
    }

    #[test]
    fn test_balance_text_reports_shortfall() {
        colored::control::set_override(false);
        let check = BalanceCheck::evaluate(Amount::from_nano(50_000_000), Amount::from_nano(150_000_000));
        let text = OutputFormatter::new(OutputFormat::Text).format_balance(
            &Address::new(0, [1u8; 32]),
            &check,
            &estimate(),
        );
        assert!(text.contains("short by 0.1"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a very long outcome", 10), "a very ...");
    }
}
