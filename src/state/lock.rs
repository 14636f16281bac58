//! Run locks for the funding wallet.
//!
//! Submitting from one wallet in two runs at once races on message ordering,
//! so a run holds a lock keyed by its funding address for its whole duration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::Address;

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// Information about a held run lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Funding address the lock protects.
    pub funding_address: Address,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a lock acquired now.
    #[must_use]
    pub fn new(funding_address: Address, holder: &str) -> Self {
        Self::acquired_at(funding_address, holder, Utc::now())
    }

    /// Creates a lock acquired at the given time.
    #[must_use]
    pub fn acquired_at(funding_address: Address, holder: &str, at: DateTime<Utc>) -> Self {
        Self {
            lock_id: Uuid::new_v4().to_string(),
            funding_address,
            holder: holder.to_string(),
            acquired_at: at,
            expires_at: at + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Returns the lock file name for a funding address.
#[must_use]
pub fn lock_file_name(funding_address: &Address) -> String {
    format!(
        "{}_{}.lock",
        funding_address.workchain(),
        hex::encode(funding_address.hash())
    )
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}
