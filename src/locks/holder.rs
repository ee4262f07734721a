//! Who holds a run lock.

use crate::error::{GateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Contents of a run lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub run_id: String,
    /// Gate operation in progress (`execute`, `run-gate`, `rerun`, `bypass`).
    pub operation: String,
    /// `user@host` of the holding process.
    pub owner: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    /// Holder record for this process.
    pub fn current(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
            owner: owner_string(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::LockError(format!("failed to read lock '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GateError::LockError(format!("malformed lock '{}': {}", path.display(), e))
        })
    }

    /// How long the lock has been held. Zero if the clock went backwards.
    pub fn held_for(&self) -> Duration {
        (Utc::now() - self.acquired_at).to_std().unwrap_or_default()
    }

    pub fn is_stale(&self, stale_after: Duration) -> bool {
        self.held_for() > stale_after
    }

    /// `execute by alice@box (pid 42) for 1h 5m`
    pub fn describe(&self) -> String {
        format!(
            "{} by {} (pid {}) for {}",
            self.operation,
            self.owner,
            self.pid,
            format_held(self.held_for())
        )
    }
}

fn format_held(held: Duration) -> String {
    let minutes = held.as_secs() / 60;
    match (minutes / (24 * 60), minutes / 60) {
        (0, 0) => format!("{}m", minutes),
        (0, hours) => format!("{}h {}m", hours, minutes % 60),
        (days, hours) => format!("{}d {}h", days, hours % 24),
    }
}

/// Identity of the local operator as `user@host`.
///
/// Also the actor of bypass audit records.
pub fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}@{}", user, host)
}
