//! Crash-safe file replacement.
//!
//! Content goes to a hidden sibling (`.<name>.<pid>.<n>.tmp`), is fsynced,
//! then renamed over the target, so readers see either the old record or the
//! new one. Concurrent writers of one target never share a temp file. The
//! artifact listing skips these temp names.

use crate::error::{GateError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Suffix of in-flight temp files.
pub const TEMP_SUFFIX: &str = ".tmp";

fn io_error(action: &str, path: &Path, e: impl std::fmt::Display) -> GateError {
    GateError::IoError(format!("failed to {} '{}': {}", action, path.display(), e))
}

/// Replace `path` with `content`, creating parent directories as needed.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;
    }

    let temp = temp_sibling(path)?;
    let written = File::create(&temp)
        .and_then(|mut file| file.write_all(content).and_then(|_| file.sync_all()));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(io_error("write", &temp, e));
    }

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(io_error("replace", path, e));
    }
    sync_parent(path);
    Ok(())
}

pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Replace `path` with the pretty-printed JSON of `value`.
pub fn atomic_write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut json = serde_json::to_vec_pretty(value).map_err(|e| io_error("serialize", path, e))?;
    json.push(b'\n');
    atomic_write(path, &json)
}

/// Whether `name` is an in-flight temp file of [`atomic_write`].
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

fn temp_sibling(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io_error("name a temp file for", target, "no file name"))?;
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    Ok(target.with_file_name(format!(
        ".{}.{}.{}{}",
        name,
        std::process::id(),
        n,
        TEMP_SUFFIX
    )))
}

/// Persist the rename itself. Best effort; only meaningful on unix.
fn sync_parent(target: &Path) {
    #[cfg(unix)]
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    #[cfg(not(unix))]
    let _ = target;
}
