//! Run records and their persistence.
//!
//! A [`Run`] carries the submitted change (refs, task, manifest), the
//! per-gate results and the bypass audit trail. Records are written through
//! a [`RunRepository`]; the CLI uses the JSON-file implementation under
//! `.gatekeep/runs/`, tests and embedders may use the in-memory one.

mod model;
mod repository;


pub use model::{
    BypassRecord, FileAction, Gate, GateResult, GateStatus, ManifestEntry, Run, RunError,
    RunRequest, RunStatus, RunType, ValidatorResult, ValidatorStatus, aggregate_status,
    parse_manifest,
};
pub use repository::{FileRunRepository, InMemoryRunRepository, RunRepository};
