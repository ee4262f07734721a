//! Append-only NDJSON event log, one file per run.

use super::types::RunEvent;
use crate::error::{GateError, Result};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

/// Append one event as a JSON line and sync it to disk.
///
/// The parent directory is created on first use.
pub fn append_event(path: &Path, event: &RunEvent) -> Result<()> {
    let line = serde_json::to_string(event)
        .map_err(|e| GateError::IoError(format!("failed to serialize event: {}", e)))?;

    if let Some(dir) = path.parent()
        && !dir.exists()
    {
        fs::create_dir_all(dir).map_err(|e| {
            GateError::IoError(format!(
                "failed to create events directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            GateError::IoError(format!(
                "failed to open events file '{}': {}",
                path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", line).map_err(|e| {
        GateError::IoError(format!(
            "failed to write event to '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.sync_data().map_err(|e| {
        GateError::IoError(format!(
            "failed to sync events file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Events stored after byte `offset`, and the offset to resume from.
///
/// A trailing partial line (a writer mid-append) is left for the next read.
/// Lines that do not parse are logged and skipped.
pub fn read_events_from(path: &Path, offset: u64) -> Result<(Vec<RunEvent>, u64)> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), offset)),
        Err(e) => {
            return Err(GateError::IoError(format!(
                "failed to open events file '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(offset))
        .and_then(|_| file.read_to_end(&mut buf))
        .map_err(|e| {
            GateError::IoError(format!(
                "failed to read events file '{}': {}",
                path.display(),
                e
            ))
        })?;

    let complete = match buf.iter().rposition(|b| *b == b'\n') {
        Some(i) => i + 1,
        None => return Ok((Vec::new(), offset)),
    };

    let mut events = Vec::new();
    for line in String::from_utf8_lossy(&buf[..complete]).lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RunEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt event line"),
        }
    }

    Ok((events, offset + complete as u64))
}
