//! Configuration entry types.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared type of a configuration value. Values are always stored as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    #[default]
    String,
    Number,
    Boolean,
}

impl ValueType {
    /// Check that `value` is a valid encoding for this type.
    pub fn check(&self, key: &str, value: &str) -> Result<()> {
        let ok = match self {
            ValueType::String => true,
            ValueType::Number => value.trim().parse::<u64>().is_ok(),
            ValueType::Boolean => parse_bool(value).is_some(),
        };

        if ok {
            Ok(())
        } else {
            Err(GateError::ConfigError(format!(
                "value '{}' is not a valid {} for '{}'",
                value,
                self.as_str(),
                key
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Number => "NUMBER",
            ValueType::Boolean => "BOOLEAN",
        }
    }
}

/// Parse a boolean configuration value (`true/false`, `1/0`, `yes/no`).
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// One configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub value: String,

    #[serde(rename = "type", default)]
    pub value_type: ValueType,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_category() -> String {
    "custom".to_string()
}

/// On-disk layout of `config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub entries: BTreeMap<String, ConfigEntry>,
}

fn default_version() -> u32 {
    1
}

impl ConfigFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self {
                version: default_version(),
                entries: BTreeMap::new(),
            });
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::ConfigError(format!("failed to parse config YAML: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GateError::ConfigError(format!("failed to serialize config: {}", e)))
    }
}
