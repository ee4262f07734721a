//! Persistent configuration store.

use super::defaults::{self, DEFAULTS};
use super::snapshot::ConfigSnapshot;
use super::types::{ConfigEntry, ConfigFile, ValueType};
use crate::error::{GateError, Result};
use crate::fs::atomic_write_file;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// Shared, read-mostly configuration table.
///
/// Backed by `config.yaml` when opened from a path. Reads take a snapshot;
/// writes replace the table and persist it atomically.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, ConfigEntry>>,
}

impl ConfigStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path)?;
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Capture the current values.
    ///
    /// A file-backed store re-reads its file first so edits made by another
    /// process apply to the next gate. An unreadable file keeps the last good
    /// table and logs a warning.
    pub fn snapshot(&self) -> ConfigSnapshot {
        if let Some(path) = &self.path {
            match load_entries(path) {
                Ok(fresh) => {
                    *self.write() = fresh;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "keeping previous configuration"),
            }
        }

        let values = self
            .read()
            .iter()
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect();
        ConfigSnapshot::new(values)
    }

    /// Current entry for `key`.
    pub fn get(&self, key: &str) -> Option<ConfigEntry> {
        self.read().get(key).cloned()
    }

    /// All entries ordered by key.
    pub fn list(&self) -> Vec<(String, ConfigEntry)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set `key` to `value`.
    ///
    /// Known keys keep their declared type and the value is checked against
    /// it. Unknown keys are stored as STRING in the `custom` category.
    pub fn set(&self, key: &str, value: &str) -> Result<ConfigEntry> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GateError::ConfigError("configuration key is empty".into()));
        }

        let entry = {
            let mut entries = self.write();
            let mut entry = entries
                .get(key)
                .cloned()
                .or_else(|| defaults::find(key).map(entry_from_default))
                .unwrap_or_else(|| ConfigEntry {
                    value: String::new(),
                    value_type: ValueType::String,
                    category: "custom".to_string(),
                    description: None,
                });

            entry.value_type.check(key, value)?;
            entry.value = value.to_string();
            entries.insert(key.to_string(), entry.clone());
            entry
        };

        self.persist()?;
        info!(key, value, "configuration updated");
        Ok(entry)
    }

    /// Insert every compiled default that is not already present.
    ///
    /// Existing values are never overwritten. Returns the keys inserted.
    pub fn seed(&self) -> Result<Vec<String>> {
        let inserted = {
            let mut entries = self.write();
            let mut inserted = Vec::new();
            for default in DEFAULTS {
                if !entries.contains_key(default.key) {
                    entries.insert(default.key.to_string(), entry_from_default(default));
                    inserted.push(default.key.to_string());
                }
            }
            inserted
        };

        if !inserted.is_empty() || self.path.as_ref().is_some_and(|p| !p.exists()) {
            self.persist()?;
        }
        Ok(inserted)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = ConfigFile {
            version: 1,
            entries: self.read().clone(),
        };
        atomic_write_file(path, &file.to_yaml()?)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, ConfigEntry>> {
        // A poisoned table is still a valid table: writers replace it wholesale.
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, ConfigEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry_from_default(default: &defaults::DefaultEntry) -> ConfigEntry {
    ConfigEntry {
        value: default.value.to_string(),
        value_type: default.value_type,
        category: default.category.to_string(),
        description: Some(default.description.to_string()),
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, ConfigEntry>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        GateError::ConfigError(format!(
            "failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(ConfigFile::from_yaml(&content)?.entries)
}
