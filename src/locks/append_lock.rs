//! Short-lived lock serializing appends to a shared file.

use super::holder::LockHolder;
use crate::error::{GateError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::warn;

const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive hold on `<file>.lock`, waited for rather than refused.
///
/// Held only across a read-then-append, so a lock older than `stale_after`
/// belongs to a process that died mid-append and is removed.
#[derive(Debug)]
pub struct AppendLock {
    path: PathBuf,
}

impl AppendLock {
    /// Take the lock at `path`, retrying for up to `wait`.
    ///
    /// # Errors
    ///
    /// * `GateError::LockError` - Still held after `wait`, or not creatable
    pub fn acquire(
        path: &Path,
        holder: &LockHolder,
        wait: Duration,
        stale_after: Duration,
    ) -> Result<Self> {
        let deadline = Instant::now() + wait;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Metadata is informational; the file's existence is the lock.
                    if let Ok(json) = serde_json::to_vec(holder) {
                        let _ = file.write_all(&json);
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_age(path).is_some_and(|age| age > stale_after) {
                        match fs::remove_file(path) {
                            Ok(()) => warn!(path = %path.display(), "removed stale append lock"),
                            Err(e) if e.kind() == ErrorKind::NotFound => {}
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "failed to remove stale append lock")
                            }
                        }
                        continue;
                    }
                    if Instant::now() >= deadline {
                        let held_by = LockHolder::read(path)
                            .map(|h| format!(": {}", h.describe()))
                            .unwrap_or_default();
                        return Err(GateError::LockError(format!(
                            "timed out waiting for '{}'{}",
                            path.display(),
                            held_by
                        )));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(GateError::LockError(format!(
                        "failed to create lock '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Age from the holder record, or from the file's mtime while the holder is
/// still being written.
fn lock_age(path: &Path) -> Option<Duration> {
    if let Ok(holder) = LockHolder::read(path) {
        return Some(holder.held_for());
    }
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    SystemTime::now().duration_since(modified).ok()
}

impl Drop for AppendLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release append lock");
        }
    }
}
