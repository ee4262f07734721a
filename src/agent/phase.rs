//! Phases, budgets and agent run records.

use crate::error::{GateError, Result, codes};
use crate::run::RunError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One phase of the generative pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Plan,
    Spec,
    Implement,
    Fix,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Plan, Step::Spec, Step::Implement, Step::Fix];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Plan => "plan",
            Step::Spec => "spec",
            Step::Implement => "implement",
            Step::Fix => "fix",
        }
    }
}

impl FromStr for Step {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| {
                GateError::invalid_request(
                    codes::INVALID_STEP,
                    format!("unknown step '{}' (expected plan, spec, implement or fix)", s),
                )
            })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved provider or model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionSource {
    /// Given with the request.
    Explicit,
    /// Persisted per-step configuration.
    StepConfig,
    /// Compiled default.
    Default,
}

/// Resolved provider and model of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSelection {
    pub step: Step,
    pub provider: String,
    pub model: String,
    #[serde(skip)]
    pub provider_source: Option<SelectionSource>,
    #[serde(skip)]
    pub model_source: Option<SelectionSource>,
}

/// Token and iteration limits of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub max_tokens: u64,
    pub max_iterations: u64,
}

/// What a caller gets back when a phase is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseHandle {
    pub run_id: String,
    pub phase: PhaseSelection,
    pub events_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRunStatus {
    Running,
    Completed,
    Failed,
}

/// Outcome of one completed or failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub step: Step,
    pub provider: String,
    pub model: String,
    /// Artifact holding the phase output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Source files extracted from the output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A generative run: one or more phases sharing an output namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    pub id: String,
    pub output_id: String,
    pub status: AgentRunStatus,
    pub task: String,
    pub project_path: PathBuf,
    pub budget: Budget,
    pub tokens_used: u64,
    pub iterations: u64,
    #[serde(default)]
    pub phases: Vec<PhaseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRun {
    pub fn new(output_id: String, task: String, project_path: PathBuf, budget: Budget) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            output_id,
            status: AgentRunStatus::Running,
            task,
            project_path,
            budget,
            tokens_used: 0,
            iterations: 0,
            phases: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tokens_left(&self) -> u64 {
        self.budget.max_tokens.saturating_sub(self.tokens_used)
    }

    /// Most recent artifact written by `step`.
    pub fn artifact_of(&self, step: Step) -> Option<&str> {
        self.phases
            .iter()
            .rev()
            .filter(|p| p.step == step)
            .find_map(|p| p.artifact.as_deref())
    }

    pub fn fail_with(&mut self, code: &str, message: impl Into<String>) {
        self.status = AgentRunStatus::Failed;
        self.error = Some(RunError {
            code: code.to_string(),
            message: message.into(),
        });
        self.updated_at = Utc::now();
    }
}

/// URL of the event stream of a run.
pub fn events_url(run_id: &str) -> String {
    format!("/runs/{}/events", run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_parsing() {
        assert_eq!("plan".parse::<Step>().unwrap(), Step::Plan);
        assert_eq!(" Implement ".parse::<Step>().unwrap(), Step::Implement);
        let err = "deploy".parse::<Step>().unwrap_err();
        assert_eq!(err.code(), "INVALID_STEP");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_handle_serializes_camel_case() {
        let handle = PhaseHandle {
            run_id: "r1".to_string(),
            phase: PhaseSelection {
                step: Step::Spec,
                provider: "claude-code".to_string(),
                model: "opus".to_string(),
                provider_source: Some(SelectionSource::Default),
                model_source: Some(SelectionSource::Default),
            },
            events_url: events_url("r1"),
        };
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["runId"], "r1");
        assert_eq!(json["eventsUrl"], "/runs/r1/events");
        assert_eq!(json["phase"]["step"], "spec");
        assert_eq!(json["phase"]["model"], "opus");
        assert!(json["phase"].get("providerSource").is_none());
    }

    #[test]
    fn test_budget_accounting() {
        let mut run = AgentRun::new(
            "out".to_string(),
            "task".to_string(),
            PathBuf::from("/tmp"),
            Budget {
                max_tokens: 100,
                max_iterations: 3,
            },
        );
        run.tokens_used = 130;
        assert_eq!(run.tokens_left(), 0);

        run.fail_with("AGENT_FAILED", "boom");
        assert_eq!(run.status, AgentRunStatus::Failed);
        assert_eq!(run.error.as_ref().unwrap().message, "boom");
    }
}
