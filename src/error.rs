//! Error types for gatekeep.
//!
//! Uses thiserror for derive macros. Every variant exposes a machine-stable
//! code (for API callers), an HTTP status class (for server bindings) and a
//! CLI exit code.
//!
//! Validator verdicts are never errors: a FAILED check is recorded as a
//! `ValidatorResult`. Errors here describe requests that could not be carried
//! out at all.

use crate::exit_codes;
use thiserror::Error;

/// Machine-stable error codes shared by several call sites.
pub mod codes {
    pub const USER_ERROR: &str = "USER_ERROR";
    pub const RUN_NOT_FOUND: &str = "RUN_NOT_FOUND";
    pub const CONTRACT_RUN_NOT_FOUND: &str = "CONTRACT_RUN_NOT_FOUND";
    pub const VALIDATOR_RESULT_NOT_FOUND: &str = "VALIDATOR_RESULT_NOT_FOUND";
    pub const RUN_TERMINAL: &str = "RUN_TERMINAL";
    pub const RUN_NOT_RERUNNABLE: &str = "RUN_NOT_RERUNNABLE";
    pub const GATE_NOT_APPLICABLE: &str = "GATE_NOT_APPLICABLE";
    pub const VALIDATOR_NOT_BYPASSABLE: &str = "VALIDATOR_NOT_BYPASSABLE";
    pub const EXECUTION_NOT_ALLOWED: &str = "EXECUTION_NOT_ALLOWED";
    pub const INVALID_MANIFEST: &str = "INVALID_MANIFEST";
    pub const INVALID_GATE: &str = "INVALID_GATE";
    pub const INVALID_STEP: &str = "INVALID_STEP";
    pub const MISSING_CONTRACT_RUN: &str = "MISSING_CONTRACT_RUN";
    pub const PATH_TRAVERSAL: &str = "PATH_TRAVERSAL";
    pub const ARTIFACT_NOT_FOUND: &str = "ARTIFACT_NOT_FOUND";
    pub const INVALID_PROVIDER: &str = "INVALID_PROVIDER";
    pub const INVALID_MODEL: &str = "INVALID_MODEL";
    pub const AGENT_FAILED: &str = "AGENT_FAILED";
    pub const AGENT_RUN_NOT_FOUND: &str = "AGENT_RUN_NOT_FOUND";
    pub const BUDGET_EXHAUSTED: &str = "BUDGET_EXHAUSTED";
    pub const FIX_ATTEMPTS_EXHAUSTED: &str = "FIX_ATTEMPTS_EXHAUSTED";
    pub const SANDBOX_CREATE_FAILED: &str = "SANDBOX_CREATE_FAILED";
    pub const GIT_ERROR: &str = "GIT_ERROR";
    pub const LOCK_HELD: &str = "LOCK_HELD";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Main error type for gatekeep operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// Invalid arguments, unreadable files, or other local problems.
    #[error("{0}")]
    UserError(String),

    /// A referenced entity does not exist.
    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    /// The request is well-formed but not allowed in the current state.
    #[error("{message}")]
    InvalidState { code: &'static str, message: String },

    /// The request itself is malformed.
    #[error("{message}")]
    InvalidRequest { code: &'static str, message: String },

    /// Provider or model could not be resolved or is not a known value.
    #[error("{message}")]
    ProviderError { code: &'static str, message: String },

    /// The isolated checkout could not be materialized.
    #[error("Sandbox error: {0}")]
    SandboxError(String),

    /// Git operation failed.
    #[error("Git operation failed: {0}")]
    GitError(String),

    /// Lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// A configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persisted state could not be read or written.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl GateError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        GateError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_state(code: &'static str, message: impl Into<String>) -> Self {
        GateError::InvalidState {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(code: &'static str, message: impl Into<String>) -> Self {
        GateError::InvalidRequest {
            code,
            message: message.into(),
        }
    }

    pub fn provider(code: &'static str, message: impl Into<String>) -> Self {
        GateError::ProviderError {
            code,
            message: message.into(),
        }
    }

    /// Machine-stable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::UserError(_) => codes::USER_ERROR,
            GateError::NotFound { code, .. }
            | GateError::InvalidState { code, .. }
            | GateError::InvalidRequest { code, .. }
            | GateError::ProviderError { code, .. } => code,
            GateError::SandboxError(_) => codes::SANDBOX_CREATE_FAILED,
            GateError::GitError(_) => codes::GIT_ERROR,
            GateError::LockError(_) => codes::LOCK_HELD,
            GateError::ConfigError(_) => codes::CONFIG_ERROR,
            GateError::IoError(_) => codes::IO_ERROR,
        }
    }

    /// HTTP status a server binding should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            GateError::UserError(_) => 400,
            GateError::NotFound { .. } => 404,
            GateError::InvalidState { .. } => 409,
            GateError::InvalidRequest { .. } => 400,
            GateError::ProviderError { .. } => 400,
            GateError::LockError(_) => 409,
            GateError::SandboxError(_)
            | GateError::GitError(_)
            | GateError::ConfigError(_)
            | GateError::IoError(_) => 500,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            GateError::UserError(_)
            | GateError::NotFound { .. }
            | GateError::InvalidState { .. }
            | GateError::InvalidRequest { .. }
            | GateError::ProviderError { .. }
            | GateError::ConfigError(_)
            | GateError::IoError(_) => exit_codes::USER_ERROR,
            GateError::SandboxError(_) => exit_codes::SANDBOX_FAILURE,
            GateError::GitError(_) => exit_codes::GIT_FAILURE,
            GateError::LockError(_) => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Result type alias for gatekeep operations.
pub type Result<T> = std::result::Result<T, GateError>;
