//! Git command runner for gatekeep.
//!
//! Sandboxes, diffs and the manifest checks all shell out to git through
//! [`run_git`]; a non-zero exit becomes `GateError::GitError` (exit code 3).

use crate::error::{GateError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trailing whitespace removed).
    ///
    /// Leading whitespace is kept: porcelain formats encode status in the
    /// first columns.
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns true if stdout is empty.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }

    /// Returns stdout lines as a vector.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Run a git command with the specified working directory.
///
/// # Returns
///
/// * `Ok(GitOutput)` - On successful execution (exit code 0)
/// * `Err(GateError::GitError)` - On spawn failure or non-zero exit code
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();
    debug!(cwd = %cwd.display(), args = ?args, "running git");

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            GateError::GitError(format!(
                "failed to execute git {}: {}",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(GateError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            exit_code,
            error_msg
        )))
    }
}

/// Get the repository root directory using `git rev-parse --show-toplevel`.
///
/// "Not a git repository" is reported as a user error (exit 1), not a git
/// failure (exit 3).
pub fn get_repo_root<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| {
            GateError::UserError(format!("failed to execute git: {} (is git installed?)", e))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(PathBuf::from(git_output.stdout.trim()))
    } else {
        Err(GateError::UserError(
            "not inside a git repository. Run this command from within a git repository."
                .to_string(),
        ))
    }
}

/// Get the main worktree of the repository containing `cwd`.
///
/// The first entry of `git worktree list --porcelain` is always the main
/// worktree, so a command invoked from inside a sandbox still resolves the
/// original checkout.
pub fn get_main_worktree<P: AsRef<Path>>(cwd: P) -> Result<PathBuf> {
    let output = run_git(cwd, &["worktree", "list", "--porcelain"])?;
    output
        .lines()
        .into_iter()
        .find_map(|line| line.strip_prefix("worktree "))
        .map(PathBuf::from)
        .ok_or_else(|| GateError::GitError("git worktree list returned no entries".to_string()))
}

/// Check whether a ref (branch, tag, SHA) resolves to a commit.
pub fn ref_exists<P: AsRef<Path>>(cwd: P, reference: &str) -> bool {
    let spec = format!("{}^{{commit}}", reference);
    run_git(cwd, &["rev-parse", "--verify", "--quiet", &spec]).is_ok()
}

/// Check whether `path` exists in the tree of `reference`.
pub fn path_exists_at_ref<P: AsRef<Path>>(cwd: P, reference: &str, path: &str) -> bool {
    let spec = format!("{}:{}", reference, path);
    run_git(cwd, &["cat-file", "-e", &spec]).is_ok()
}
