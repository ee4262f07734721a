//! Gate 2: checks against the produced change.

use super::super::context::ValidationContext;
use super::super::globs::PathMatcher;
use super::super::imports::{ImportTarget, SourceKind, extract_imports, python_candidates, script_candidates};
use super::super::types::{Validator, ValidatorOutcome};
use super::{missing_tool, package_script, run_tool};
use crate::config::{defaults, keys};
use crate::diff::{AddedLine, ChangeKind, normalize_path};
use crate::run::{FileAction, Gate};
use anyhow::Result;
use regex::Regex;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;
use walkdir::WalkDir;

/// Every changed path is declared in the manifest.
pub struct DiffScopeEnforcement;

impl Validator for DiffScopeEnforcement {
    fn code(&self) -> &'static str {
        "DIFF_SCOPE_ENFORCEMENT"
    }

    fn gate(&self) -> Gate {
        Gate::Execution
    }

    fn description(&self) -> &'static str {
        "Changes stay within the declared manifest"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let declared: BTreeMap<String, FileAction> = ctx
            .run()
            .manifest
            .iter()
            .map(|e| (normalize_path(&e.path), e.action))
            .collect();
        let changes = ctx.changes()?;

        let mut undeclared = Vec::new();
        let mut mismatched = Vec::new();
        let mut touched = BTreeSet::new();

        for change in changes {
            let mut paths = vec![change.path.as_str()];
            if let ChangeKind::Renamed { from } = &change.kind {
                paths.push(from.as_str());
            }
            for path in paths {
                touched.insert(path.to_string());
                if !declared.contains_key(path) {
                    undeclared.push(path.to_string());
                }
            }

            let expected = match &change.kind {
                ChangeKind::Added => FileAction::Create,
                ChangeKind::Modified => FileAction::Modify,
                ChangeKind::Deleted => FileAction::Delete,
                ChangeKind::Renamed { .. } => FileAction::Create,
            };
            if let Some(action) = declared.get(&change.path)
                && *action != expected
            {
                mismatched.push(format!("{}: declared {} but the change is {}", change.path, action, expected));
            }
        }

        let untouched: Vec<String> = declared
            .keys()
            .filter(|p| !touched.contains(*p))
            .map(|p| format!("{}: declared but unchanged", p))
            .collect();

        let context = json!({
            "changed": touched,
            "declared": declared.keys().collect::<Vec<_>>(),
        });

        if !undeclared.is_empty() {
            return Ok(ValidatorOutcome::failed(format!("{} undeclared files changed", undeclared.len()))
                .with_details(undeclared)
                .with_context(context));
        }

        let warnings: Vec<String> = mismatched.into_iter().chain(untouched).collect();
        if warnings.is_empty() {
            Ok(ValidatorOutcome::passed(format!("{} changed files, all declared", touched.len()))
                .with_context(context))
        } else {
            Ok(ValidatorOutcome::warning("changes are in scope but differ from the manifest")
                .with_details(warnings)
                .with_context(context))
        }
    }
}

/// Existing tests are not modified or deleted.
pub struct TestReadOnlyEnforcement;

impl Validator for TestReadOnlyEnforcement {
    fn code(&self) -> &'static str {
        "TEST_READ_ONLY_ENFORCEMENT"
    }

    fn gate(&self) -> Gate {
        Gate::Execution
    }

    fn description(&self) -> &'static str {
        "Pre-existing test files stay untouched"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let excluded_patterns = ctx.config().list(
            keys::TEST_READ_ONLY_EXCLUDED_PATHS,
            defaults::TEST_READ_ONLY_EXCLUDED_PATHS,
        );
        let excluded = PathMatcher::new(&excluded_patterns);

        let mut violations = Vec::new();
        let mut skipped = Vec::new();

        for change in ctx.changes()? {
            if !change.touches_existing() {
                continue;
            }
            let original = match &change.kind {
                ChangeKind::Renamed { from } => from.as_str(),
                _ => change.path.as_str(),
            };
            if !ctx.is_test_file(original) {
                continue;
            }
            if let Some(pattern) = excluded.matched_pattern(original) {
                skipped.push(format!("{} (excluded by {})", original, pattern));
                continue;
            }
            violations.push(format!("{}: existing test {}", original, verb(&change.kind)));
        }

        let context = json!({ "excludedPatterns": excluded_patterns, "excluded": skipped });
        if violations.is_empty() {
            Ok(ValidatorOutcome::passed("no existing tests modified").with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} existing tests modified", violations.len()))
                .with_details(violations)
                .with_context(context))
        }
    }
}

fn verb(kind: &ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "added",
        ChangeKind::Modified => "modified",
        ChangeKind::Deleted => "deleted",
        ChangeKind::Renamed { .. } => "renamed",
    }
}

/// Deleted files are no longer imported by remaining sources.
pub struct DeleteDependencyCheck;

impl Validator for DeleteDependencyCheck {
    fn code(&self) -> &'static str {
        "DELETE_DEPENDENCY_CHECK"
    }

    fn gate(&self) -> Gate {
        Gate::Execution
    }

    fn description(&self) -> &'static str {
        "No remaining file imports a deleted file"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let deleted: BTreeSet<String> = ctx.deleted_paths()?.into_iter().collect();
        if deleted.is_empty() {
            return Ok(ValidatorOutcome::passed("no files deleted"));
        }

        let mut ignore_dirs = ctx
            .config()
            .list(keys::DELETE_CHECK_IGNORE_DIRS, defaults::DELETE_CHECK_IGNORE_DIRS);
        if !ignore_dirs.iter().any(|d| d == ctx.dependency_dir()) {
            ignore_dirs.push(ctx.dependency_dir().to_string());
        }

        let resolver = ctx.import_resolver();
        let root = ctx.sandbox_path();
        let mut references = Vec::new();
        let mut scanned = 0usize;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && ignore_dirs.iter().any(|d| e.file_name().to_string_lossy() == d.as_str()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable path during delete check");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = normalize_path(&relative.to_string_lossy());
            let Some(kind) = SourceKind::from_path(&relative) else {
                continue;
            };
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            scanned += 1;

            for import in extract_imports(kind, &content) {
                let ImportTarget::Local(target) = resolver.classify(kind, &relative, &import.specifier) else {
                    continue;
                };
                let candidates = match kind {
                    SourceKind::Script => script_candidates(&target),
                    SourceKind::Python => python_candidates(&target),
                };
                if let Some(hit) = candidates.iter().find(|c| deleted.contains(*c)) {
                    references.push(format!("{}:{} still imports deleted {}", relative, import.line, hit));
                }
            }
        }

        let context = json!({ "deleted": deleted, "filesScanned": scanned, "ignoredDirs": ignore_dirs });
        if references.is_empty() {
            Ok(ValidatorOutcome::passed(format!("{} deleted files unreferenced", deleted.len()))
                .with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} references to deleted files", references.len()))
                .with_details(references)
                .with_context(context))
        }
    }
}

/// Compiled stub regexes plus the file extensions they apply to.
pub(crate) struct StubPatterns {
    patterns: Vec<(Regex, String)>,
    extensions: Vec<String>,
}

impl StubPatterns {
    /// Compile configured patterns; invalid ones are logged and dropped.
    pub(crate) fn new(patterns: &[String], extensions: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some((re, p.clone())),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid stub pattern");
                    None
                }
            })
            .collect();
        let extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        Self { patterns, extensions }
    }

    fn should_check(&self, path: &str) -> bool {
        match path.rsplit_once('.') {
            Some((_, ext)) => self.extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }

    fn matched(&self, content: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(content))
            .map(|(_, p)| p.as_str())
    }

    /// `path:line  + content` findings among `lines`.
    pub(crate) fn scan(&self, lines: &[AddedLine]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| self.should_check(&l.file_path))
            .filter_map(|l| {
                self.matched(&l.content).map(|pattern| {
                    format!("{}:{}  + {}  [{}]", l.file_path, l.line_number, l.content.trim(), pattern)
                })
            })
            .collect()
    }
}

pub struct StubDetection;

impl Validator for StubDetection {
    fn code(&self) -> &'static str {
        "STUB_DETECTION"
    }

    fn gate(&self) -> Gate {
        Gate::Execution
    }

    fn is_hard_block(&self) -> bool {
        false
    }

    fn description(&self) -> &'static str {
        "Added lines contain no placeholder code"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let patterns = ctx.config().list(keys::STUB_PATTERNS, defaults::STUB_PATTERNS);
        let extensions = ctx
            .config()
            .list(keys::STUB_CHECK_EXTENSIONS, defaults::STUB_CHECK_EXTENSIONS);
        let stubs = StubPatterns::new(&patterns, &extensions);

        let lines = ctx.added_lines()?;
        let findings = stubs.scan(lines);

        let context = json!({ "linesScanned": lines.len(), "extensions": extensions });
        if findings.is_empty() {
            Ok(ValidatorOutcome::passed("no stub patterns in added lines").with_context(context))
        } else {
            Ok(ValidatorOutcome::warning(format!("{} stub patterns in added lines", findings.len()))
                .with_details(findings)
                .with_context(context))
        }
    }
}

/// Runs the project's test suite in the sandbox.
pub struct TestExecution;

impl TestExecution {
    fn command(ctx: &ValidationContext) -> Option<String> {
        let configured = ctx.config().string(keys::TEST_COMMAND, "");
        if !configured.is_empty() {
            return Some(configured);
        }
        package_script(ctx, "test").map(|_| "npm test".to_string())
    }
}

impl Validator for TestExecution {
    fn code(&self) -> &'static str {
        "TEST_EXECUTION"
    }

    fn gate(&self) -> Gate {
        Gate::Execution
    }

    fn mutates_worktree(&self) -> bool {
        true
    }

    fn description(&self) -> &'static str {
        "The test suite passes"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let Some(command) = Self::command(ctx) else {
            let skip = ctx.config().flag(keys::TEST_SKIP_IF_NO_COMMAND, true);
            return Ok(missing_tool(skip, "no test command configured or detected", keys::TEST_SKIP_IF_NO_COMMAND));
        };
        let timeout = ctx
            .config()
            .duration_ms(keys::TEST_EXECUTION_TIMEOUT_MS, defaults::TEST_EXECUTION_TIMEOUT_MS);
        Ok(run_tool(ctx, "test suite", &command, timeout))
    }
}
