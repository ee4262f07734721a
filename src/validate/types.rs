//! Validator trait and verdict types.

use super::context::ValidationContext;
use crate::run::{Gate, ValidatorStatus};
use serde_json::Value;

/// What a validator reports back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorOutcome {
    pub status: ValidatorStatus,
    pub message: String,
    pub details: Vec<String>,
    pub context: Value,
}

impl ValidatorOutcome {
    fn with_status(status: ValidatorStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
            context: Value::Null,
        }
    }

    pub fn passed(message: impl Into<String>) -> Self {
        Self::with_status(ValidatorStatus::Passed, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_status(ValidatorStatus::Failed, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(ValidatorStatus::Warning, message)
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::with_status(ValidatorStatus::Skipped, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// A named check run against a sandbox.
///
/// Implementations are looked up by [`Validator::code`] in the registry.
/// Returning `Err` (or panicking) records a FAILED verdict for this validator
/// only; sibling validators are unaffected.
pub trait Validator: Send + Sync {
    /// Stable identifier, e.g. `DIFF_SCOPE_ENFORCEMENT`.
    fn code(&self) -> &'static str;

    fn gate(&self) -> Gate;

    /// Whether a FAILED verdict blocks the gate.
    fn is_hard_block(&self) -> bool {
        true
    }

    /// Whether the check may write to the sandbox working tree.
    ///
    /// Such validators run after the read-only ones, one at a time.
    fn mutates_worktree(&self) -> bool {
        false
    }

    fn description(&self) -> &'static str;

    fn execute(&self, ctx: &ValidationContext) -> anyhow::Result<ValidatorOutcome>;
}
