//! Event record and well-known event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type names published by the orchestrator and agent runner.
pub mod kinds {
    pub const CONNECTED: &str = "connected";
    pub const RUN_STARTED: &str = "run:started";
    pub const SANDBOX_READY: &str = "sandbox:ready";
    pub const GATE_STARTED: &str = "gate:started";
    pub const VALIDATOR_COMPLETED: &str = "validator:completed";
    pub const GATE_COMPLETED: &str = "gate:completed";
    pub const VALIDATOR_BYPASSED: &str = "validator:bypassed";
    pub const RUN_COMPLETED: &str = "run:completed";
    pub const RUN_FAILED: &str = "run:failed";
    pub const RUN_ABORTED: &str = "run:aborted";
    pub const FILES_UPLOADED: &str = "files:uploaded";
    pub const AGENT_STARTED: &str = "agent:started";
    pub const AGENT_PHASE_STARTED: &str = "agent:phase_started";
    pub const AGENT_PHASE_COMPLETED: &str = "agent:phase_completed";
    pub const AGENT_ARTIFACT: &str = "agent:artifact";
    pub const AGENT_COMPLETED: &str = "agent:completed";
    pub const AGENT_FAILED: &str = "agent:failed";

    /// Types after which a stream has nothing more to say.
    pub const TERMINAL: &[&str] = &[
        RUN_COMPLETED,
        RUN_FAILED,
        RUN_ABORTED,
        AGENT_COMPLETED,
        AGENT_FAILED,
    ];
}

/// One published event.
///
/// `seq` starts at 0 for each run and grows by one per publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub seq: u64,
    pub run_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl RunEvent {
    /// Whether this event ends the run's stream.
    pub fn is_terminal(&self) -> bool {
        kinds::TERMINAL.contains(&self.event_type.as_str())
    }

    /// The per-subscription greeting; not part of the persisted stream.
    pub fn is_synthetic(&self) -> bool {
        self.event_type == kinds::CONNECTED
    }

    pub(crate) fn connected(run_id: &str, resume_after: Option<u64>) -> Self {
        Self {
            seq: resume_after.unwrap_or(0),
            run_id: run_id.to_string(),
            event_type: kinds::CONNECTED.to_string(),
            payload: serde_json::json!({ "runId": run_id, "lastEventId": resume_after }),
            ts: Utc::now(),
        }
    }
}
