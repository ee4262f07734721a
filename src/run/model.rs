//! Run data model.

use crate::error::{GateError, Result, codes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of run. Contract runs validate the plan, execution runs the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunType {
    Contract,
    Execution,
}

impl RunType {
    /// Gates executed for this run type, in order.
    pub fn gates(&self) -> &'static [Gate] {
        match self {
            RunType::Contract => &[Gate::Sanitization, Gate::Contract],
            RunType::Execution => &[Gate::Execution, Gate::Integrity],
        }
    }
}

impl FromStr for RunType {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "contract" => Ok(RunType::Contract),
            "execution" => Ok(RunType::Execution),
            other => Err(GateError::invalid_request(
                codes::USER_ERROR,
                format!("unknown run type '{}' (expected contract or execution)", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed | RunStatus::Aborted)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Passed => "PASSED",
            RunStatus::Failed => "FAILED",
            RunStatus::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

/// The four gates, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gate {
    Sanitization,
    Contract,
    Execution,
    Integrity,
}

impl Gate {
    pub const ALL: [Gate; 4] = [
        Gate::Sanitization,
        Gate::Contract,
        Gate::Execution,
        Gate::Integrity,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Gate::Sanitization => 0,
            Gate::Contract => 1,
            Gate::Execution => 2,
            Gate::Integrity => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Gate::Sanitization => "Sanitization",
            Gate::Contract => "Contract Validation",
            Gate::Execution => "Execution",
            Gate::Integrity => "Integrity",
        }
    }

    pub fn from_number(number: u8) -> Result<Self> {
        Gate::ALL
            .into_iter()
            .find(|g| g.number() == number)
            .ok_or_else(|| {
                GateError::invalid_request(
                    codes::INVALID_GATE,
                    format!("gate must be 0..3, got {}", number),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileAction {
    Create,
    Modify,
    Delete,
}

impl FromStr for FileAction {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(FileAction::Create),
            "MODIFY" => Ok(FileAction::Modify),
            "DELETE" => Ok(FileAction::Delete),
            other => Err(GateError::invalid_request(
                codes::INVALID_MANIFEST,
                format!("unknown manifest action '{}'", other),
            )),
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileAction::Create => "CREATE",
            FileAction::Modify => "MODIFY",
            FileAction::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// One declared file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub action: FileAction,
}

impl ManifestEntry {
    pub fn new(path: &str, action: FileAction) -> Self {
        Self {
            path: path.to_string(),
            action,
        }
    }
}

/// Parse a `path:ACTION,path:ACTION` manifest.
///
/// The action is taken after the last `:` so Windows-style paths survive.
pub fn parse_manifest(spec: &str) -> Result<Vec<ManifestEntry>> {
    spec.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (path, action) = item.rsplit_once(':').ok_or_else(|| {
                GateError::invalid_request(
                    codes::INVALID_MANIFEST,
                    format!("manifest entry '{}' must be path:ACTION", item),
                )
            })?;
            Ok(ManifestEntry::new(path.trim(), action.parse()?))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Warning,
}

impl GateStatus {
    /// Passed or warning: the pipeline may advance.
    pub fn is_non_blocking(&self) -> bool {
        matches!(self, GateStatus::Passed | GateStatus::Warning)
    }
}

/// Verdict of one validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorResult {
    pub validator_code: String,
    pub gate_number: u8,
    pub status: ValidatorStatus,
    pub is_hard_block: bool,
    #[serde(default)]
    pub bypassed: bool,
    pub message: String,
    /// Findings, one per line item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    /// Inputs considered and reasoning.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ValidatorResult {
    /// FAILED, hard-blocking and not bypassed.
    pub fn is_blocking(&self) -> bool {
        self.status == ValidatorStatus::Failed && self.is_hard_block && !self.bypassed
    }
}

/// Aggregate status of a gate from its validators.
///
/// A blocking validator fails the gate. Otherwise any warning, skip,
/// soft failure or bypass downgrades it to WARNING. An empty gate keeps its
/// prior status, or is PENDING when it has none.
pub fn aggregate_status(validators: &[ValidatorResult], prior: Option<GateStatus>) -> GateStatus {
    if validators.is_empty() {
        return prior.unwrap_or(GateStatus::Pending);
    }
    if validators.iter().any(ValidatorResult::is_blocking) {
        return GateStatus::Failed;
    }
    let degraded = validators
        .iter()
        .any(|v| v.status != ValidatorStatus::Passed || v.bypassed);
    if degraded {
        GateStatus::Warning
    } else {
        GateStatus::Passed
    }
}

/// Result of one gate execution.
///
/// `failed_count` counts every FAILED verdict, bypassed or not;
/// `bypassed_count` counts the bypassed subset. Bypass never rewrites a
/// verdict, so the counters describe verdicts and `status` describes effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub gate_number: u8,
    pub gate_name: String,
    pub status: GateStatus,
    pub passed_count: u32,
    pub failed_count: u32,
    pub warning_count: u32,
    pub skipped_count: u32,
    #[serde(default)]
    pub bypassed_count: u32,
    pub validators: Vec<ValidatorResult>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GateResult {
    /// A gate that has started but has no verdicts yet.
    pub fn running(gate: Gate) -> Self {
        Self {
            gate_number: gate.number(),
            gate_name: gate.name().to_string(),
            status: GateStatus::Running,
            passed_count: 0,
            failed_count: 0,
            warning_count: 0,
            skipped_count: 0,
            bypassed_count: 0,
            validators: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// A completed gate built from its verdicts.
    pub fn completed(
        gate: Gate,
        validators: Vec<ValidatorResult>,
        started_at: DateTime<Utc>,
        prior: Option<GateStatus>,
    ) -> Self {
        let mut result = Self {
            validators,
            started_at,
            completed_at: Some(Utc::now()),
            ..Self::running(gate)
        };
        result.recompute(prior);
        result
    }

    /// Recompute counters and status from the validators.
    pub fn recompute(&mut self, prior: Option<GateStatus>) {
        let count = |status: ValidatorStatus| {
            self.validators.iter().filter(|v| v.status == status).count() as u32
        };
        let passed = count(ValidatorStatus::Passed);
        let failed = count(ValidatorStatus::Failed);
        let warning = count(ValidatorStatus::Warning);
        let skipped = count(ValidatorStatus::Skipped);
        let bypassed = self.validators.iter().filter(|v| v.bypassed).count() as u32;

        self.passed_count = passed;
        self.failed_count = failed;
        self.warning_count = warning;
        self.skipped_count = skipped;
        self.bypassed_count = bypassed;
        self.status = aggregate_status(&self.validators, prior);
    }

    pub fn gate(&self) -> Option<Gate> {
        Gate::from_number(self.gate_number).ok()
    }
}

/// Audit record of a bypass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BypassRecord {
    pub validator_code: String,
    pub gate_number: u8,
    /// `user@host` of the operator.
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// System failure recorded on a run (not a validation verdict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// Parameters of a new run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub output_id: String,
    pub task_prompt: String,
    pub manifest: Vec<ManifestEntry>,
    pub run_type: RunType,
    pub contract_run_id: Option<String>,
    pub project_path: PathBuf,
    pub base_ref: String,
    pub target_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub output_id: String,
    pub run_type: RunType,
    pub status: RunStatus,
    pub project_path: PathBuf,
    pub base_ref: String,
    pub target_ref: String,
    pub task_prompt: String,
    pub manifest: Vec<ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub gates: Vec<GateResult>,
    #[serde(default)]
    pub bypasses: Vec<BypassRecord>,
}

impl Run {
    /// A new PENDING run with a fresh v4 id.
    pub fn new(request: RunRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            output_id: request.output_id,
            run_type: request.run_type,
            status: RunStatus::Pending,
            project_path: request.project_path,
            base_ref: request.base_ref,
            target_ref: request.target_ref,
            task_prompt: request.task_prompt,
            manifest: request.manifest,
            contract_run_id: request.contract_run_id,
            sandbox_path: None,
            error: None,
            created_at: now,
            updated_at: now,
            gates: Vec::new(),
            bypasses: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn gate_result(&self, gate: Gate) -> Option<&GateResult> {
        self.gates.iter().find(|g| g.gate_number == gate.number())
    }

    pub fn gate_status(&self, gate: Gate) -> GateStatus {
        self.gate_result(gate)
            .map(|g| g.status)
            .unwrap_or(GateStatus::Pending)
    }

    /// Replace the result of one gate wholesale, keeping gate order.
    pub fn put_gate(&mut self, result: GateResult) {
        self.gates.retain(|g| g.gate_number != result.gate_number);
        self.gates.push(result);
        self.gates.sort_by_key(|g| g.gate_number);
    }

    /// True if any recorded verdict is FAILED, hard-blocking and not bypassed.
    pub fn has_blocking_failure(&self) -> bool {
        self.gates
            .iter()
            .flat_map(|g| &g.validators)
            .any(ValidatorResult::is_blocking)
    }

    /// Whether every gate of this run type has completed without blocking.
    pub fn all_gates_non_blocking(&self) -> bool {
        self.run_type
            .gates()
            .iter()
            .all(|g| self.gate_status(*g).is_non_blocking())
    }

    /// Status implied by the recorded gates once execution has finished.
    pub fn settled_status(&self) -> RunStatus {
        if self.error.is_some() || self.has_blocking_failure() {
            RunStatus::Failed
        } else if self.all_gates_non_blocking() {
            RunStatus::Passed
        } else {
            RunStatus::Failed
        }
    }

    pub fn fail_with(&mut self, code: &str, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(RunError {
            code: code.to_string(),
            message: message.into(),
        });
        self.touch();
    }
}
