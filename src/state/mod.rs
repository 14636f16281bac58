//! Report persistence for Halldyll contract deployments.
//!
//! This module stores the report of every run and guards each funding wallet
//! with a run lock so two runs never submit from it at once.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalReportStore;
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id, lock_file_name};
pub use store::ReportStore;
pub use types::{
    DeploymentReport, FailureInfo, REPORT_VERSION, ReportInput, ReportStatus,
    generate_deployment_id,
};
