//! Run persistence.

use super::model::Run;
use crate::error::{GateError, Result, codes};
use crate::fs::atomic_write_json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Narrow persistence interface for run records.
pub trait RunRepository: Send + Sync {
    /// Insert or replace a run.
    fn save(&self, run: &Run) -> Result<()>;

    /// Load a run by id.
    fn load(&self, id: &str) -> Result<Option<Run>>;

    /// All runs, newest first.
    fn list(&self) -> Result<Vec<Run>>;

    /// Load a run or fail with `RUN_NOT_FOUND`.
    fn get(&self, id: &str) -> Result<Run> {
        self.load(id)?
            .ok_or_else(|| GateError::not_found(codes::RUN_NOT_FOUND, format!("run '{}' not found", id)))
    }
}

/// Ids are used as file names; anything else cannot name a stored run.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn sort_newest_first(runs: &mut [Run]) {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// One pretty-printed JSON file per run.
#[derive(Debug, Clone)]
pub struct FileRunRepository {
    dir: PathBuf,
}

impl FileRunRepository {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read(path: &Path) -> Result<Run> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::UserError(format!("failed to read run '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GateError::UserError(format!("failed to parse run '{}': {}", path.display(), e))
        })
    }
}

impl RunRepository for FileRunRepository {
    fn save(&self, run: &Run) -> Result<()> {
        if !is_valid_id(&run.id) {
            return Err(GateError::UserError(format!("invalid run id '{}'", run.id)));
        }
        atomic_write_json(self.path(&run.id), run)
    }

    fn load(&self, id: &str) -> Result<Option<Run>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let path = self.path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<Run>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            GateError::UserError(format!(
                "failed to read runs directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut runs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path) {
                Ok(run) => runs.push(run),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable run"),
            }
        }

        sort_newest_first(&mut runs);
        Ok(runs)
    }
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: Mutex<HashMap<String, Run>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Run>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunRepository for InMemoryRunRepository {
    fn save(&self, run: &Run) -> Result<()> {
        self.runs().insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Run>> {
        Ok(self.runs().get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Run>> {
        let mut runs: Vec<Run> = self.runs().values().cloned().collect();
        sort_newest_first(&mut runs);
        Ok(runs)
    }
}
