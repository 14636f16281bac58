//! Report store trait definition.
//!
//! This module defines the common interface for report storage backends.

use async_trait::async_trait;

use crate::error::Result;
use crate::ledger::Address;

use super::lock::LockInfo;
use super::types::DeploymentReport;

/// Trait for report storage backends.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Saves a report under its deployment id.
    async fn save(&self, report: &DeploymentReport) -> Result<()>;

    /// Loads the report with the given id.
    async fn load(&self, deployment_id: &str) -> Result<DeploymentReport>;

    /// Lists every stored report, oldest first.
    async fn list(&self) -> Result<Vec<DeploymentReport>>;

    /// Returns the most recent report, if any.
    async fn latest(&self) -> Result<Option<DeploymentReport>> {
        Ok(self.list().await?.pop())
    }

    /// Deletes the report with the given id.
    async fn delete(&self, deployment_id: &str) -> Result<()>;

    /// Acquires the run lock of a funding address.
    async fn acquire_lock(&self, funding_address: &Address, holder: &str) -> Result<LockInfo>;

    /// Releases a run lock if it is still held under `lock_id`.
    async fn release_lock(&self, funding_address: &Address, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self, funding_address: &Address) -> Result<Option<LockInfo>>;

    /// Removes a lock regardless of its holder.
    async fn force_unlock(&self, funding_address: &Address) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
