//! State directory resolution for gatekeep.
//!
//! All persisted state lives under `<repo>/.gatekeep/`:
//!
//! ```text
//! .gatekeep/
//!   config.yaml          validation configuration
//!   agents.yaml          per-step provider/model defaults
//!   runs/<id>.json       run records
//!   events/<id>.ndjson   per-run event log
//!   artifacts/<output>/  generated and uploaded files
//!   sandboxes/<run>/     per-run worktrees
//!   locks/<run>.lock     execution locks
//! ```
//!
//! Commands resolve the context from the main worktree, so invoking gatekeep
//! from inside a sandbox still targets the original repository.

use crate::error::{GateError, Result};
use crate::git;
use std::env;
use std::path::{Path, PathBuf};

/// State directory name relative to the repository root.
pub const STATE_DIR: &str = ".gatekeep";

/// Resolved paths for one gatekeep installation. All paths are absolute.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Main worktree of the repository under validation.
    pub repo_root: PathBuf,
    /// `{repo_root}/.gatekeep`
    pub state_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub events_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub sandboxes_dir: PathBuf,
    pub locks_dir: PathBuf,
}

impl GateContext {
    /// Resolve the context from the current working directory.
    ///
    /// # Returns
    ///
    /// * `Ok(GateContext)` - Successfully resolved context
    /// * `Err(GateError::UserError)` - If not in a git repository (exit code 1)
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            GateError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Self::resolve_from(&cwd)
    }

    /// Resolve the context from a specific directory inside a repository.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P) -> Result<Self> {
        let cwd = cwd.as_ref();
        let toplevel = git::get_repo_root(cwd)?;

        let repo_root = match git::get_main_worktree(cwd) {
            Ok(main) if main.exists() => main,
            _ => toplevel,
        };

        Ok(Self::at(repo_root))
    }

    /// Build a context rooted at `repo_root` without consulting git.
    pub fn at<P: Into<PathBuf>>(repo_root: P) -> Self {
        let repo_root = repo_root.into();
        let state_dir = repo_root.join(STATE_DIR);

        Self {
            runs_dir: state_dir.join("runs"),
            events_dir: state_dir.join("events"),
            artifacts_dir: state_dir.join("artifacts"),
            sandboxes_dir: state_dir.join("sandboxes"),
            locks_dir: state_dir.join("locks"),
            state_dir,
            repo_root,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join("config.yaml")
    }

    pub fn agents_config_path(&self) -> PathBuf {
        self.state_dir.join("agents.yaml")
    }

    pub fn run_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{}.json", run_id))
    }

    pub fn events_path(&self, run_id: &str) -> PathBuf {
        self.events_dir.join(format!("{}.ndjson", run_id))
    }

    pub fn run_lock_path(&self, run_id: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", run_id))
    }

    /// Base directory under which a run's sandboxes are created.
    pub fn run_sandbox_base(&self, run_id: &str) -> PathBuf {
        self.sandboxes_dir.join(run_id)
    }

    /// Check whether `gatekeep init` has been run.
    pub fn is_initialized(&self) -> bool {
        self.state_dir.is_dir()
    }

    /// Ensure an initialized state directory, returning a user error otherwise.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(GateError::UserError(format!(
                "gatekeep is not initialized in '{}'. Run `gatekeep init` first.",
                self.repo_root.display()
            )))
        }
    }

    /// Create every state directory. Existing directories are left alone.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            &self.state_dir,
            &self.runs_dir,
            &self.events_dir,
            &self.artifacts_dir,
            &self.sandboxes_dir,
            &self.locks_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                GateError::UserError(format!(
                    "failed to create directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
