//! Sandbox isolation for gatekeep runs.
//!
//! Every run validates inside its own git worktree, created detached at the
//! run's target ref under `.gatekeep/sandboxes/<run>/<ref>`. The heavyweight
//! dependency tree (`node_modules` by default) is shared into the sandbox
//! through a filesystem pointer instead of being copied.
//!
//! Cleanup removes the pointer first and only then the worktree, so the
//! real dependency tree is never traversed or deleted.

mod link;
mod manager;
mod naming;
mod worktree;

#[cfg(test)]
mod tests;

pub use link::{DependencyLinker, PlatformLinker, remove_link};
pub use manager::{SandboxHandle, SandboxManager, SandboxOutcome};
pub use naming::sanitize_ref;
pub use worktree::{WorktreeEntry, is_registered_worktree, list_worktrees};
