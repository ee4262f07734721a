//! Immutable configuration snapshots.

use super::types::parse_bool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Point-in-time view of the configuration table.
///
/// Cheap to clone; every clone shares the same values.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    values: Arc<BTreeMap<String, String>>,
}

impl ConfigSnapshot {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Build a snapshot from literal pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Raw value for `key`, if configured.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Trimmed, non-empty value for `key`, or `default`.
    pub fn string(&self, key: &str, default: &str) -> String {
        match self.get(key).map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }

    /// Effective list for a comma-separated key.
    ///
    /// The result is the compiled `defaults` followed by configured values,
    /// with duplicates and empty items removed. Configuration can only add.
    pub fn list(&self, key: &str, defaults: &[&str]) -> Vec<String> {
        let configured = self.get(key).unwrap_or_default();
        let mut out: Vec<String> = Vec::with_capacity(defaults.len());

        for item in defaults
            .iter()
            .copied()
            .chain(configured.split(','))
            .map(str::trim)
            .filter(|item| !item.is_empty())
        {
            if !out.iter().any(|existing| existing == item) {
                out.push(item.to_string());
            }
        }
        out
    }

    /// Effective map for a `key:value,key:value` setting.
    ///
    /// Compiled defaults are the base; a configured pair overrides the default
    /// for its key and adds new keys. Pairs without a `:` are ignored with a
    /// warning.
    pub fn map(&self, key: &str, defaults: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let Some(configured) = self.get(key) else {
            return out;
        };

        for pair in configured.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once(':') {
                Some((k, v)) if !k.trim().is_empty() => {
                    out.insert(k.trim().to_string(), v.trim().to_string());
                }
                _ => warn!(key, pair, "ignoring malformed map entry"),
            }
        }
        out
    }

    /// Boolean value for `key`; absent or malformed values yield `default`.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(raw) if raw.trim().is_empty() => default,
            Some(raw) => parse_bool(raw).unwrap_or_else(|| {
                warn!(key, value = raw, default, "malformed boolean, using default");
                default
            }),
        }
    }

    /// Non-negative integer for `key`; absent or malformed values yield `default`.
    pub fn number(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            None => default,
            Some(raw) if raw.trim().is_empty() => default,
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!(key, value = raw, default, "malformed number, using default");
                default
            }),
        }
    }

    /// Millisecond duration for `key`. Zero is treated as malformed.
    pub fn duration_ms(&self, key: &str, default_ms: u64) -> Duration {
        let ms = match self.number(key, default_ms) {
            0 => {
                warn!(key, default_ms, "zero timeout, using default");
                default_ms
            }
            ms => ms,
        };
        Duration::from_millis(ms)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
