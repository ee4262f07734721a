//! Gate orchestration for gatekeep runs.
//!
//! The [`GateOrchestrator`] owns the run state machine:
//!
//! ```text
//! PENDING -> RUNNING -> PASSED | FAILED | ABORTED
//! ```
//!
//! Contract runs execute gates 0 and 1, execution runs gates 2 and 3. Gates
//! run strictly in order against a per-run sandbox and a configuration
//! snapshot; a blocking gate stops the run. Every transition is persisted
//! through the [`RunRepository`](crate::run::RunRepository) before it is
//! published on the [`EventBroadcaster`](crate::events::EventBroadcaster).
//!
//! Gate executions of one run are serialized by an in-process mutex and by
//! the run's lock file. Abort takes neither: it flips the stored status and
//! cancels the run's token, and the executing thread notices both.

mod actions;
mod execution;
mod service;


pub use service::GateOrchestrator;
