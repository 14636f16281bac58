//! Local file-based report storage.
//!
//! Reports live as pretty-printed JSON files named after their deployment id;
//! run locks live next to them under `locks/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{HalldyllError, Result, StateError};
use crate::ledger::Address;

use super::lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id, lock_file_name};
use super::store::ReportStore;
use super::types::DeploymentReport;

/// Lock directory name inside the report directory.
const LOCK_DIR: &str = "locks";

/// Local file-based report store.
#[derive(Debug)]
pub struct LocalReportStore {
    /// Directory holding report files.
    base_dir: PathBuf,
    /// Directory holding lock files.
    lock_dir: PathBuf,
}

impl LocalReportStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let lock_dir = base_dir.join(LOCK_DIR);
        Self { base_dir, lock_dir }
    }

    /// Returns the report directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn report_path(&self, deployment_id: &str) -> Result<PathBuf> {
        let valid = !deployment_id.is_empty()
            && deployment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(HalldyllError::State(StateError::ReportNotFound {
                deployment_id: deployment_id.to_string(),
            }));
        }
        Ok(self.base_dir.join(format!("{deployment_id}.json")))
    }

    fn lock_path(&self, funding_address: &Address) -> PathBuf {
        self.lock_dir.join(lock_file_name(funding_address))
    }

    async fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            debug!("Creating directory: {}", dir.display());
            fs::create_dir_all(dir).await.map_err(|e| {
                HalldyllError::State(StateError::write(format!(
                    "Failed to create directory {}: {e}",
                    dir.display()
                )))
            })?;
        }
        Ok(())
    }

    /// Writes `content` to `path` through a temporary file and a rename.
    async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            HalldyllError::State(StateError::write(format!("Failed to create temp file: {e}")))
        })?;
        file.write_all(content.as_bytes()).await.map_err(|e| {
            HalldyllError::State(StateError::write(format!("Failed to write file: {e}")))
        })?;
        file.sync_all().await.map_err(|e| {
            HalldyllError::State(StateError::write(format!("Failed to sync file: {e}")))
        })?;

        fs::rename(&temp_path, path).await.map_err(|e| {
            HalldyllError::State(StateError::write(format!("Failed to rename file: {e}")))
        })
    }

    async fn read_report(path: &Path) -> Result<DeploymentReport> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            HalldyllError::State(StateError::Corrupted {
                message: format!("Failed to read {}: {e}", path.display()),
            })
        })?;
        serde_json::from_str(&content).map_err(|e| {
            HalldyllError::State(StateError::Corrupted {
                message: format!("Failed to parse {}: {e}", path.display()),
            })
        })
    }

    async fn read_lock_file(&self, funding_address: &Address) -> Result<Option<LockInfo>> {
        let path = self.lock_path(funding_address);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            HalldyllError::State(StateError::Corrupted {
                message: format!("Failed to read lock file: {e}"),
            })
        })?;

        let lock_info = serde_json::from_str(&content).map_err(|e| {
            HalldyllError::State(StateError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock_info))
    }

    async fn delete_lock_file(&self, funding_address: &Address) -> Result<()> {
        let path = self.lock_path(funding_address);
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                HalldyllError::State(StateError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for LocalReportStore {
    async fn save(&self, report: &DeploymentReport) -> Result<()> {
        Self::ensure_dir(&self.base_dir).await?;
        let path = self.report_path(&report.deployment_id)?;

        info!("Saving report to: {}", path.display());

        let content = serde_json::to_string_pretty(report).map_err(|e| {
            HalldyllError::State(StateError::serialization(format!(
                "Failed to serialize report: {e}"
            )))
        })?;

        Self::write_atomic(&path, &content).await?;
        debug!("Report {} saved", report.deployment_id);
        Ok(())
    }

    async fn load(&self, deployment_id: &str) -> Result<DeploymentReport> {
        let path = self.report_path(deployment_id)?;
        if !path.exists() {
            return Err(HalldyllError::State(StateError::ReportNotFound {
                deployment_id: deployment_id.to_string(),
            }));
        }
        Self::read_report(&path).await
    }

    async fn list(&self) -> Result<Vec<DeploymentReport>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        let mut reports = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_report(&path).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Skipping unreadable report: {e}"),
            }
        }

        reports.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.deployment_id.cmp(&b.deployment_id))
        });
        Ok(reports)
    }

    async fn delete(&self, deployment_id: &str) -> Result<()> {
        let path = self.report_path(deployment_id)?;
        if path.exists() {
            info!("Deleting report: {}", path.display());
            fs::remove_file(&path).await.map_err(|e| {
                HalldyllError::State(StateError::write(format!("Failed to delete report: {e}")))
            })?;
        }
        Ok(())
    }

    async fn acquire_lock(&self, funding_address: &Address, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file(funding_address).await? {
            if !existing.is_expired() {
                return Err(HalldyllError::State(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }));
            }
            debug!("Expired lock found, taking over");
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(*funding_address, &holder_id);
        Self::ensure_dir(&self.lock_dir).await?;
        let content = serde_json::to_string_pretty(&lock_info).map_err(|e| {
            HalldyllError::State(StateError::serialization(format!(
                "Failed to serialize lock: {e}"
            )))
        })?;
        Self::write_atomic(&self.lock_path(funding_address), &content)
            .await
            .map_err(|e| {
                HalldyllError::State(StateError::LockFailed {
                    message: e.to_string(),
                })
            })?;

        info!(
            "Acquired run lock for {}: {} (expires in {}s)",
            funding_address.short(),
            lock_info.lock_id,
            LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    async fn release_lock(&self, funding_address: &Address, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file(funding_address).await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file(funding_address).await?;
                info!("Released run lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self, funding_address: &Address) -> Result<Option<LockInfo>> {
        self.read_lock_file(funding_address).await
    }

    async fn force_unlock(&self, funding_address: &Address) -> Result<()> {
        warn!("Force-removing run lock for {}", funding_address.short());
        self.delete_lock_file(funding_address).await
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
