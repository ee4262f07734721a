//! Per-run execution locks.
//!
//! Gate execution for a run is serialized in two layers: an in-process mutex
//! owned by the orchestrator, and a lock file at `.gatekeep/locks/<run>.lock`
//! that keeps a second gatekeep process from executing the same run.
//!
//! The lock file is created exclusively and names its [`LockHolder`]. A
//! [`RunLock`] removes it on drop; a lock left behind by a crashed process
//! is cleared once it is older than `LOCK_STALE_MINUTES`.
//!
//! An [`AppendLock`] is the short-lived variant: it guards one read-then-append
//! of a shared file (a run's event log) and waits for its holder instead of
//! failing.

mod append_lock;
mod holder;
mod run_lock;


pub use append_lock::AppendLock;
pub use holder::{LockHolder, owner_string};
pub use run_lock::RunLock;
