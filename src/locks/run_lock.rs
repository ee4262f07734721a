//! The lock file guard.

use super::holder::LockHolder;
use crate::context::GateContext;
use crate::error::{GateError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Exclusive hold on a run's lock file, released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    holder: LockHolder,
    released: bool,
}

impl RunLock {
    /// Take the lock of `run_id` for `operation`.
    ///
    /// # Errors
    ///
    /// * `GateError::LockError` - Another process holds the lock (exit code 4),
    ///   or the lock file could not be written
    pub fn acquire(ctx: &GateContext, run_id: &str, operation: &str) -> Result<Self> {
        let path = ctx.run_lock_path(run_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GateError::LockError(format!(
                    "failed to create locks directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let held_by = LockHolder::read(&path)
                    .map(|h| format!(": {}", h.describe()))
                    .unwrap_or_default();
                return Err(GateError::LockError(format!(
                    "run '{}' is locked by another process{}",
                    run_id, held_by
                )));
            }
            Err(e) => {
                return Err(GateError::LockError(format!(
                    "failed to create lock '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        let holder = LockHolder::current(run_id, operation);
        let written = serde_json::to_vec_pretty(&holder)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                file.write_all(&json)
                    .and_then(|_| file.sync_all())
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            let _ = fs::remove_file(&path);
            return Err(GateError::LockError(format!(
                "failed to write lock '{}': {}",
                path.display(),
                e
            )));
        }

        debug!(run_id, operation, "run lock acquired");
        Ok(Self {
            path,
            holder,
            released: false,
        })
    }

    /// Holder of the run's lock, if it is locked and readable.
    pub fn inspect(ctx: &GateContext, run_id: &str) -> Option<LockHolder> {
        let path = ctx.run_lock_path(run_id);
        path.exists().then(|| LockHolder::read(&path).ok()).flatten()
    }

    /// Remove the run's lock if it has been held longer than `stale_after`.
    ///
    /// A crashed process leaves its lock behind; this lets the next
    /// execution of the run proceed. Returns true if a lock was removed.
    pub fn clear_stale(ctx: &GateContext, run_id: &str, stale_after: Duration) -> bool {
        let Some(holder) = Self::inspect(ctx, run_id) else {
            return false;
        };
        if !holder.is_stale(stale_after) {
            return false;
        }
        match fs::remove_file(ctx.run_lock_path(run_id)) {
            Ok(()) => {
                warn!(run_id, held_by = %holder.describe(), "removed stale run lock");
                true
            }
            Err(e) => {
                warn!(run_id, error = %e, "failed to remove stale run lock");
                false
            }
        }
    }

    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now, surfacing a failed removal.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| {
            GateError::LockError(format!(
                "failed to release lock '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}
