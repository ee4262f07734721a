//! Agent configuration (`.gatekeep/agents.yaml`).
//!
//! # File Format
//!
//! ```yaml
//! providers:
//!   claude-code:
//!     command: "claude -p {prompt} --model {model}"
//!     timeout_seconds: 900
//!     models: [opus, sonnet, haiku]
//!   local:
//!     command: "./scripts/llm.sh {prompt_file} {model}"
//!     environment:
//!       LLM_ENDPOINT: "http://localhost:8080"
//!
//! steps:
//!   plan:
//!     provider: local
//!     model: small
//!     max_tokens: 16000
//!   implement:
//!     model: opus
//!     prompt_template: |
//!       Implement {task} following {spec}
//!
//! defaults:
//!   timeout_seconds: 600
//!   max_tokens: 65536
//!   max_iterations: 100
//! ```
//!
//! Provider commands are split into words first and placeholders are then
//! substituted per word, so `{prompt}` may contain quotes and newlines:
//!
//! - `{prompt}` - Rendered prompt text
//! - `{prompt_file}` - Path of the file holding the prompt
//! - `{model}` - Resolved model name
//! - `{max_tokens}` - Token budget left for the run
//! - `{step}` - Phase name
//!
//! `claude-code` is always available; configuring it overrides the built-in
//! command.

use super::phase::Step;
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Default timeout of one provider call in seconds.
const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Name of the always-available provider.
pub const BUILTIN_PROVIDER: &str = "claude-code";

const BUILTIN_COMMAND: &str = "claude -p {prompt} --model {model}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Provider profiles keyed by identifier.
    pub providers: BTreeMap<String, ProviderProfile>,

    /// Per-step defaults keyed by step name.
    pub steps: BTreeMap<String, StepConfig>,

    pub defaults: AgentDefaults,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    pub timeout_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_tokens: None,
            max_iterations: None,
            extra: BTreeMap::new(),
        }
    }
}

/// How to invoke one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Command template with placeholders.
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,

    /// Accepted model names. Empty accepts any well-formed name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

impl ProviderProfile {
    fn builtin() -> Self {
        Self {
            command: BUILTIN_COMMAND.to_string(),
            ..Default::default()
        }
    }

    pub fn effective_timeout(&self, defaults: &AgentDefaults) -> u64 {
        self.timeout_seconds.unwrap_or(defaults.timeout_seconds)
    }
}

/// Persisted defaults of one step. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    /// Inline prompt template replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl AgentsConfig {
    /// Load from a YAML file. `Ok(None)` if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::ConfigError(format!(
                "failed to read agents config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content).map(Some)
    }

    /// Load from a YAML file, falling back to built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AgentsConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::ConfigError(format!("failed to parse agents.yaml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GateError::ConfigError(format!("failed to serialize agents config: {}", e)))
    }

    /// Validate the configuration.
    ///
    /// Rules:
    /// - `defaults.timeout_seconds` is positive
    /// - provider ids and commands are not empty, timeouts are positive
    /// - step keys name a known step
    /// - step providers name a known provider
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| GateError::ConfigError(format!("agents.yaml: {}", msg));

        if self.defaults.timeout_seconds == 0 {
            return Err(invalid(
                "defaults.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (id, provider) in &self.providers {
            if id.trim().is_empty() {
                return Err(invalid("provider identifier cannot be empty".to_string()));
            }
            if provider.command.trim().is_empty() {
                return Err(invalid(format!("provider '{}' has an empty command", id)));
            }
            if provider.timeout_seconds == Some(0) {
                return Err(invalid(format!("provider '{}' has timeout_seconds of 0", id)));
            }
        }

        for (name, step) in &self.steps {
            name.parse::<Step>()
                .map_err(|_| invalid(format!("unknown step '{}'", name)))?;
            if let Some(provider) = step.provider.as_deref()
                && !provider.trim().is_empty()
                && self.provider(provider).is_none()
            {
                return Err(invalid(format!(
                    "step '{}' references unknown provider '{}'",
                    name, provider
                )));
            }
        }

        Ok(())
    }

    /// Profile of a provider, configured or built-in.
    pub fn provider(&self, id: &str) -> Option<ProviderProfile> {
        match self.providers.get(id) {
            Some(profile) => Some(profile.clone()),
            None if id == BUILTIN_PROVIDER => Some(ProviderProfile::builtin()),
            None => None,
        }
    }

    /// Every provider identifier, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        if !self.providers.contains_key(BUILTIN_PROVIDER) {
            names.push(BUILTIN_PROVIDER.to_string());
        }
        names.sort();
        names
    }

    pub fn step(&self, step: Step) -> Option<&StepConfig> {
        self.steps.get(step.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_has_builtin_provider() {
        let config = AgentsConfig::from_yaml("{}").unwrap();
        assert_eq!(config.provider_names(), vec!["claude-code"]);
        let builtin = config.provider("claude-code").unwrap();
        assert!(builtin.command.contains("{model}"));
        assert!(config.provider("nope").is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
providers:
  local:
    command: "./llm.sh {prompt_file} {model}"
    timeout_seconds: 30
    environment:
      LLM_ENDPOINT: "http://localhost:8080"
    models: [small, large]
steps:
  plan:
    provider: local
    model: small
    max_tokens: 16000
  implement:
    model: opus
defaults:
  timeout_seconds: 120
  max_iterations: 40
future_field: kept
"#;
        let config = AgentsConfig::from_yaml(yaml).unwrap();

        let local = config.provider("local").unwrap();
        assert_eq!(local.timeout_seconds, Some(30));
        assert_eq!(local.models, vec!["small", "large"]);
        assert_eq!(
            local.environment.get("LLM_ENDPOINT").map(String::as_str),
            Some("http://localhost:8080")
        );

        let plan = config.step(Step::Plan).unwrap();
        assert_eq!(plan.provider.as_deref(), Some("local"));
        assert_eq!(plan.max_tokens, Some(16000));
        assert!(config.step(Step::Spec).is_none());

        assert_eq!(config.defaults.timeout_seconds, 120);
        assert_eq!(config.defaults.max_iterations, Some(40));
        assert!(config.extra.contains_key("future_field"));
        assert_eq!(config.provider_names(), vec!["claude-code", "local"]);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("defaults:\n  timeout_seconds: 0\n", "greater than 0"),
            ("providers:\n  x:\n    command: \"\"\n", "empty command"),
            (
                "providers:\n  x:\n    command: \"echo\"\n    timeout_seconds: 0\n",
                "timeout_seconds of 0",
            ),
            ("steps:\n  deploy:\n    model: opus\n", "unknown step 'deploy'"),
            (
                "steps:\n  plan:\n    provider: ghost\n",
                "unknown provider 'ghost'",
            ),
        ];
        for (yaml, expected) in cases {
            let err = AgentsConfig::from_yaml(yaml).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{:?} should mention {:?}, got {}",
                yaml,
                expected,
                err
            );
        }
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("agents.yaml");
        assert!(AgentsConfig::load(&path).unwrap().is_none());
        assert!(AgentsConfig::load_or_default(&path).unwrap().steps.is_empty());

        std::fs::write(&path, "steps:\n  fix:\n    model: sonnet\n").unwrap();
        let config = AgentsConfig::load(&path).unwrap().unwrap();
        assert_eq!(
            config.step(Step::Fix).unwrap().model.as_deref(),
            Some("sonnet")
        );
    }

    #[test]
    fn test_yaml_round_trip_keeps_steps() {
        let config = AgentsConfig::from_yaml("steps:\n  spec:\n    model: haiku\n").unwrap();
        let reparsed = AgentsConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed.step(Step::Spec), config.step(Step::Spec));
    }
}
