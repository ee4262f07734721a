//! Sandbox creation and teardown.

use super::link::{DependencyLinker, PlatformLinker};
use super::naming::sanitize_ref;
use super::worktree;
use crate::config::defaults::SANDBOX_DEPENDENCY_DIR;
use crate::error::{GateError, Result};
use crate::git;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of [`SandboxManager::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxOutcome {
    pub sandbox_path: PathBuf,
    pub success: bool,
    pub junction_created: bool,
    /// An existing worktree at the path was reused.
    pub reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A materialized sandbox owned by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxHandle {
    pub sandbox_path: PathBuf,
    pub junction_created: bool,
    pub run_id: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub reused: bool,
    /// Name of the linked dependency directory inside the sandbox.
    pub dependency_dir: String,
}

/// Creates and destroys per-run worktrees.
pub struct SandboxManager {
    linker: Box<dyn DependencyLinker>,
    dependency_dir: String,
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("dependency_dir", &self.dependency_dir)
            .finish_non_exhaustive()
    }
}

impl Default for SandboxManager {
    fn default() -> Self {
        Self::new(Box::new(PlatformLinker), SANDBOX_DEPENDENCY_DIR)
    }
}

impl SandboxManager {
    pub fn new(linker: Box<dyn DependencyLinker>, dependency_dir: &str) -> Self {
        Self {
            linker,
            dependency_dir: dependency_dir.to_string(),
        }
    }

    pub fn dependency_dir(&self) -> &str {
        &self.dependency_dir
    }

    /// Materialize a checkout of `reference` under `sandbox_base`.
    ///
    /// Only a failure of the worktree step fails the outcome. A missing or
    /// unlinkable dependency tree degrades to `junction_created = false`.
    ///
    /// # Arguments
    ///
    /// * `source` - Repository to check out from
    /// * `sandbox_base` - Directory owned by the run; the sandbox is `<base>/<ref>`
    /// * `reference` - Ref to check out (detached)
    pub fn create(&self, source: &Path, sandbox_base: &Path, reference: &str) -> SandboxOutcome {
        let sandbox_path = sandbox_base.join(sanitize_ref(reference));

        let reused = match self.materialize(source, &sandbox_path, reference) {
            Ok(reused) => reused,
            Err(e) => {
                warn!(sandbox = %sandbox_path.display(), error = %e, "sandbox creation failed");
                return SandboxOutcome {
                    sandbox_path,
                    success: false,
                    junction_created: false,
                    reused: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let junction_created = self.link_dependencies(source, &sandbox_path);

        info!(
            sandbox = %sandbox_path.display(),
            reference,
            reused,
            junction_created,
            "sandbox ready"
        );
        SandboxOutcome {
            sandbox_path,
            success: true,
            junction_created,
            reused,
            error: None,
        }
    }

    /// Create the worktree, or confirm an existing one. Returns true on reuse.
    fn materialize(&self, source: &Path, sandbox_path: &Path, reference: &str) -> Result<bool> {
        if sandbox_path.exists() {
            if worktree::is_registered_worktree(source, sandbox_path)? {
                debug!(sandbox = %sandbox_path.display(), "reusing existing worktree");
                return Ok(true);
            }
            return Err(GateError::SandboxError(format!(
                "'{}' exists but is not a worktree of '{}'",
                sandbox_path.display(),
                source.display()
            )));
        }

        if !git::ref_exists(source, reference) {
            return Err(GateError::SandboxError(format!(
                "ref '{}' does not resolve to a commit in '{}'",
                reference,
                source.display()
            )));
        }

        // A stale registration for a deleted directory blocks `worktree add`.
        if let Err(e) = worktree::prune(source) {
            warn!(error = %e, "git worktree prune failed");
        }

        worktree::add_detached(source, sandbox_path, reference)?;
        Ok(false)
    }

    fn link_dependencies(&self, source: &Path, sandbox_path: &Path) -> bool {
        let source_deps = source.join(&self.dependency_dir);
        let link = sandbox_path.join(&self.dependency_dir);

        if !source_deps.is_dir() {
            warn!(
                path = %source_deps.display(),
                "dependency directory not found, sandbox runs without it"
            );
            return false;
        }

        match std::fs::symlink_metadata(&link) {
            Ok(meta) if meta.file_type().is_symlink() => return true,
            Ok(_) => {
                warn!(path = %link.display(), "sandbox already has a real dependency directory");
                return false;
            }
            Err(_) => {}
        }

        match self.linker.link(&source_deps, &link) {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    link = %link.display(),
                    error = %e,
                    "dependency link failed, continuing without it"
                );
                false
            }
        }
    }

    /// Tear down a sandbox. Never fails to the caller.
    ///
    /// The dependency pointer is removed first, then the worktree is
    /// force-removed and pruned. Missing pieces are tolerated.
    pub fn cleanup(&self, sandbox_path: &Path) {
        if !sandbox_path.exists() {
            debug!(sandbox = %sandbox_path.display(), "sandbox already gone");
            return;
        }

        let link = sandbox_path.join(&self.dependency_dir);
        if let Err(e) = self.linker.unlink(&link) {
            warn!(link = %link.display(), error = %e, "failed to remove dependency link");
            // Without the pointer gone, removing the worktree could reach the real tree.
            return;
        }

        let repo = match git::get_main_worktree(sandbox_path) {
            Ok(repo) => repo,
            Err(e) => {
                warn!(sandbox = %sandbox_path.display(), error = %e, "sandbox is not a worktree");
                return;
            }
        };

        if let Err(e) = worktree::remove(&repo, sandbox_path) {
            warn!(sandbox = %sandbox_path.display(), error = %e, "failed to remove worktree");
        }
        if let Err(e) = worktree::prune(&repo) {
            warn!(error = %e, "git worktree prune failed");
        }

        if let Some(parent) = sandbox_path.parent() {
            // Only succeeds once the run's last sandbox is gone.
            let _ = std::fs::remove_dir(parent);
        }

        info!(sandbox = %sandbox_path.display(), "sandbox removed");
    }
}
