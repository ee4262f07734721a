//! Execution context handed to every validator.

use super::globs::PathMatcher;
use super::imports::{ImportRef, ImportResolver, SourceKind, extract_imports, join_normalized};
use crate::config::{ConfigSnapshot, defaults, keys};
use crate::diff::{self, AddedLine, ChangeKind, FileChange};
use crate::git;
use crate::process::{self, CancelToken, CommandOutput, DEFAULT_OUTPUT_LIMIT};
use crate::run::Run;
use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Capabilities available to a validator for one gate execution.
///
/// The configuration is a snapshot taken when the gate started; operator
/// edits made while the gate runs are not observed. Diff results are
/// computed once and shared by every validator of the gate.
pub struct ValidationContext {
    run: Run,
    sandbox: PathBuf,
    config: ConfigSnapshot,
    cancel: CancelToken,
    dependency_dir: String,
    changes: OnceLock<std::result::Result<Vec<FileChange>, String>>,
    added_lines: OnceLock<std::result::Result<Vec<AddedLine>, String>>,
    test_files: OnceLock<PathMatcher>,
}

impl ValidationContext {
    pub fn new(run: Run, sandbox: PathBuf, config: ConfigSnapshot, cancel: CancelToken) -> Self {
        let dependency_dir = config.string(keys::SANDBOX_DEPENDENCY_DIR, defaults::SANDBOX_DEPENDENCY_DIR);
        Self {
            run,
            sandbox,
            config,
            cancel,
            dependency_dir,
            changes: OnceLock::new(),
            added_lines: OnceLock::new(),
            test_files: OnceLock::new(),
        }
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn sandbox_path(&self) -> &Path {
        &self.sandbox
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Name of the linked dependency directory at the sandbox root.
    pub fn dependency_dir(&self) -> &str {
        &self.dependency_dir
    }

    /// Absolute path of `relative` inside the sandbox.
    ///
    /// Absolute paths and paths climbing out through `..` are rejected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let normalized = diff::normalize_path(relative);
        if normalized.starts_with('/') || Path::new(relative).is_absolute() {
            bail!("path '{}' is absolute", relative);
        }
        let joined = join_normalized("", &normalized)
            .ok_or_else(|| anyhow!("path '{}' escapes the sandbox", relative))?;
        Ok(self.sandbox.join(joined))
    }

    /// Read a sandbox file as UTF-8.
    ///
    /// Symlinks resolving outside the sandbox are rejected too.
    pub fn read_file(&self, relative: &str) -> Result<String> {
        let path = self.resolve(relative)?;
        let root = self
            .sandbox
            .canonicalize()
            .with_context(|| format!("resolve sandbox {}", self.sandbox.display()))?;
        let real = path
            .canonicalize()
            .with_context(|| format!("resolve {}", relative))?;
        if !real.starts_with(&root) {
            bail!("path '{}' escapes the sandbox", relative);
        }
        std::fs::read_to_string(&real).with_context(|| format!("read {}", relative))
    }

    /// Whether `relative` exists in the sandbox (links are followed).
    pub fn file_exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|p| p.exists()).unwrap_or(false)
    }

    /// Whether `path` exists in the tree of the run's base ref.
    pub fn exists_at_base(&self, path: &str) -> bool {
        git::path_exists_at_ref(&self.sandbox, &self.run.base_ref, path)
    }

    /// Files differing between the base ref and the sandbox working tree.
    ///
    /// Covers commits up to the checked-out target plus uncommitted and
    /// uploaded files. The linked dependency directory is never reported.
    pub fn changes(&self) -> Result<&[FileChange]> {
        let cached = self.changes.get_or_init(|| {
            diff::changes_since(&self.sandbox, &self.run.base_ref)
                .map(|changes| {
                    changes
                        .into_iter()
                        .filter(|c| !self.is_dependency_path(&c.path))
                        .collect()
                })
                .map_err(|e| e.to_string())
        });
        cached.as_deref().map_err(|e| anyhow!("{}", e))
    }

    /// Paths changed between the base and target refs (committed only).
    pub fn changed_between_refs(&self) -> Result<Vec<FileChange>> {
        Ok(diff::changed_files(&self.sandbox, &self.run.base_ref, &self.run.target_ref)?)
    }

    /// Uncommitted changes in the sandbox working tree.
    pub fn working_tree_changes(&self) -> Result<Vec<FileChange>> {
        let changes = diff::working_tree_changes(&self.sandbox)?;
        Ok(changes
            .into_iter()
            .filter(|c| !self.is_dependency_path(&c.path))
            .collect())
    }

    /// Paths deleted relative to the base ref.
    pub fn deleted_paths(&self) -> Result<Vec<String>> {
        Ok(self
            .changes()?
            .iter()
            .filter_map(|c| match &c.kind {
                ChangeKind::Deleted => Some(c.path.clone()),
                ChangeKind::Renamed { from } => Some(from.clone()),
                _ => None,
            })
            .collect())
    }

    /// Lines added relative to the base ref.
    pub fn added_lines(&self) -> Result<&[AddedLine]> {
        let cached = self.added_lines.get_or_init(|| {
            diff::added_lines_since(&self.sandbox, &self.run.base_ref)
                .map(|lines| {
                    lines
                        .into_iter()
                        .filter(|l| !self.is_dependency_path(&l.file_path))
                        .collect()
                })
                .map_err(|e| e.to_string())
        });
        cached.as_deref().map_err(|e| anyhow!("{}", e))
    }

    /// Import statements of a sandbox source file.
    ///
    /// Files in languages without import extraction yield nothing.
    pub fn imports(&self, relative: &str) -> Result<Vec<ImportRef>> {
        let Some(kind) = SourceKind::from_path(relative) else {
            return Ok(Vec::new());
        };
        let content = self.read_file(relative)?;
        Ok(extract_imports(kind, &content))
    }

    /// Resolver configured with builtin modules and path aliases.
    pub fn import_resolver(&self) -> ImportResolver {
        let builtins = self
            .config
            .list(keys::EXTRA_BUILTIN_MODULES, defaults::BUILTIN_MODULES);
        let aliases = self.config.map(keys::PATH_ALIASES, defaults::PATH_ALIASES);
        ImportResolver::new(builtins, aliases)
    }

    /// Whether `path` looks like a test file.
    pub fn is_test_file(&self, path: &str) -> bool {
        self.test_files
            .get_or_init(|| {
                PathMatcher::new(
                    &self
                        .config
                        .list(keys::TEST_FILE_PATTERNS, defaults::TEST_FILE_PATTERNS),
                )
            })
            .is_match(path)
    }

    /// Parsed `package.json` at the sandbox root, if present and valid.
    pub fn package_json(&self) -> Option<Value> {
        if !self.file_exists("package.json") {
            return None;
        }
        let parsed = self
            .read_file("package.json")
            .and_then(|raw| serde_json::from_str(&raw).context("parse package.json"));
        match parsed {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(sandbox = %self.sandbox.display(), error = %e, "ignoring unreadable package.json");
                None
            }
        }
    }

    /// Run a configured command line in the sandbox.
    ///
    /// The child is killed on timeout or when the run is aborted.
    pub fn run_command(&self, line: &str, timeout: Duration) -> Result<CommandOutput> {
        let cmd = process::command_from_line(line, &self.sandbox)?;
        process::run_command(cmd, timeout, &self.cancel, DEFAULT_OUTPUT_LIMIT)
    }

    /// Run a linter over `files`, appended to the configured command line.
    pub fn lint(&self, command: &str, files: &[String], timeout: Duration) -> Result<CommandOutput> {
        let words = shell_words::split(command).with_context(|| format!("parse command '{}'", command))?;
        let (program, args) = words
            .split_first()
            .ok_or_else(|| anyhow!("lint command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).args(files).current_dir(&self.sandbox);
        process::run_command(cmd, timeout, &self.cancel, DEFAULT_OUTPUT_LIMIT)
    }

    fn is_dependency_path(&self, path: &str) -> bool {
        path == self.dependency_dir
            || path
                .strip_prefix(self.dependency_dir.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
