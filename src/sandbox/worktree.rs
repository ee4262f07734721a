//! Git worktree primitives used by the sandbox manager.

use crate::error::{GateError, Result};
use crate::git::run_git;
use std::path::{Path, PathBuf};

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head_sha: Option<String>,
    pub branch: Option<String>,
    /// The worktree directory is missing and git would prune it.
    pub prunable: bool,
}

/// List all worktrees registered in the repository.
pub fn list_worktrees<P: AsRef<Path>>(repo_root: P) -> Result<Vec<WorktreeEntry>> {
    let output = run_git(repo_root, &["worktree", "list", "--porcelain"])?;

    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                head_sha: None,
                branch: None,
                prunable: false,
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(sha) = line.strip_prefix("HEAD ") {
                entry.head_sha = Some(sha.to_string());
            } else if let Some(branch_ref) = line.strip_prefix("branch ") {
                entry.branch = branch_ref.strip_prefix("refs/heads/").map(String::from);
            } else if line.starts_with("prunable") {
                entry.prunable = true;
            }
        }
    }

    if let Some(done) = current {
        worktrees.push(done);
    }

    Ok(worktrees)
}

/// Check whether `path` is a live worktree registered with the repository.
pub fn is_registered_worktree<P: AsRef<Path>>(repo_root: P, path: &Path) -> Result<bool> {
    let Ok(wanted) = path.canonicalize() else {
        return Ok(false);
    };

    Ok(list_worktrees(repo_root)?.iter().any(|wt| {
        !wt.prunable
            && wt
                .path
                .canonicalize()
                .map(|p| p == wanted)
                .unwrap_or(false)
    }))
}

/// Create a detached worktree at `path` checked out at `reference`.
pub fn add_detached<P: AsRef<Path>>(repo_root: P, path: &Path, reference: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            GateError::SandboxError(format!(
                "failed to create sandbox directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let path_str = path.to_string_lossy();
    run_git(
        repo_root,
        &["worktree", "add", "--detach", &path_str, reference],
    )
    .map_err(|e| {
        GateError::SandboxError(format!(
            "failed to create worktree at '{}' for '{}': {}",
            path_str, reference, e
        ))
    })?;

    Ok(())
}

/// Force-remove the worktree at `path`.
pub fn remove<P: AsRef<Path>>(repo_root: P, path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();
    run_git(repo_root, &["worktree", "remove", "--force", &path_str])?;
    Ok(())
}

/// Drop administrative entries of worktrees whose directories are gone.
pub fn prune<P: AsRef<Path>>(repo_root: P) -> Result<()> {
    run_git(repo_root, &["worktree", "prune"])?;
    Ok(())
}
