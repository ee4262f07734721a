//! Tests for the validator engine and built-in validators.

use super::*;
use crate::config::ConfigSnapshot;
use crate::process::CancelToken;
use crate::run::{FileAction, Gate, ManifestEntry, Run, RunRequest, RunType, ValidatorStatus};
use crate::test_support::{commit_on_branch, create_test_repo_with_files, git, write_file};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn make_run(repo: &Path, prompt: &str, manifest: &[(&str, FileAction)]) -> Run {
    Run::new(RunRequest {
        output_id: "out-1".to_string(),
        task_prompt: prompt.to_string(),
        manifest: manifest
            .iter()
            .map(|(p, a)| ManifestEntry::new(p, *a))
            .collect(),
        run_type: RunType::Contract,
        contract_run_id: None,
        project_path: repo.to_path_buf(),
        base_ref: "main".to_string(),
        target_ref: "main".to_string(),
    })
}

fn context(repo: &Path, run: Run, config: &[(&str, &str)]) -> ValidationContext {
    ValidationContext::new(
        run,
        repo.to_path_buf(),
        ConfigSnapshot::from_pairs(config),
        CancelToken::new(),
    )
}

fn run_builtin(code: &str, ctx: &ValidationContext) -> crate::run::ValidatorResult {
    let registry = ValidatorRegistry::with_builtins();
    let validator = registry.get(code).unwrap();
    execute_validator(validator.as_ref(), ctx)
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_builtin_registry_covers_every_gate() {
    let registry = ValidatorRegistry::with_builtins();
    assert_eq!(registry.len(), 16);
    assert_eq!(registry.for_gate(Gate::Sanitization).len(), 4);
    assert_eq!(registry.for_gate(Gate::Contract).len(), 4);
    assert_eq!(registry.for_gate(Gate::Execution).len(), 5);
    assert_eq!(registry.for_gate(Gate::Integrity).len(), 3);

    let codes = registry.codes();
    let mut unique = codes.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), codes.len());
}

#[test]
fn test_soft_and_mutating_flags() {
    let registry = ValidatorRegistry::with_builtins();
    assert!(!registry.get("STUB_DETECTION").unwrap().is_hard_block());
    assert!(!registry.get("TEST_TYPE_DETECTION").unwrap().is_hard_block());
    assert!(registry.get("TEST_EXECUTION").unwrap().mutates_worktree());
    assert!(registry.get("BUILD_CHECK").unwrap().mutates_worktree());
    assert!(!registry.get("LINT_CHECK").unwrap().mutates_worktree());
}

struct Fixed {
    code: &'static str,
    mutates: bool,
    behavior: fn() -> anyhow::Result<ValidatorOutcome>,
    log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl Validator for Fixed {
    fn code(&self) -> &'static str {
        self.code
    }
    fn gate(&self) -> Gate {
        Gate::Execution
    }
    fn mutates_worktree(&self) -> bool {
        self.mutates
    }
    fn description(&self) -> &'static str {
        "test validator"
    }
    fn execute(&self, _ctx: &ValidationContext) -> anyhow::Result<ValidatorOutcome> {
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.code);
        }
        (self.behavior)()
    }
}

fn fixed(code: &'static str, behavior: fn() -> anyhow::Result<ValidatorOutcome>) -> Arc<Fixed> {
    Arc::new(Fixed {
        code,
        mutates: false,
        behavior,
        log: None,
    })
}

#[test]
fn test_register_replaces_same_code() {
    let mut registry = ValidatorRegistry::new();
    registry.register(fixed("A", || Ok(ValidatorOutcome::passed("first"))));
    registry.register(fixed("A", || Ok(ValidatorOutcome::failed("second"))));
    assert_eq!(registry.len(), 1);
}

// ============================================================================
// Engine
// ============================================================================

#[test]
fn test_errors_and_panics_fail_only_their_validator() {
    let repo = create_test_repo_with_files(&[]);
    let ctx = context(repo.path(), make_run(repo.path(), "t", &[]), &[]);

    let mut registry = ValidatorRegistry::new();
    registry.register(fixed("OK", || Ok(ValidatorOutcome::passed("fine"))));
    registry.register(fixed("ERR", || Err(anyhow::anyhow!("tool exploded"))));
    registry.register(fixed("PANIC", || panic!("boom")));
    registry.register(fixed("WARN", || Ok(ValidatorOutcome::warning("meh"))));

    let seen = AtomicUsize::new(0);
    let results = execute_gate(&registry, Gate::Execution, &ctx, |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(seen.load(Ordering::SeqCst), 4);
    let codes: Vec<_> = results.iter().map(|r| r.validator_code.as_str()).collect();
    assert_eq!(codes, vec!["OK", "ERR", "PANIC", "WARN"]);

    assert_eq!(results[0].status, ValidatorStatus::Passed);
    assert_eq!(results[1].status, ValidatorStatus::Failed);
    assert!(results[1].message.contains("tool exploded"));
    assert_eq!(results[2].status, ValidatorStatus::Failed);
    assert!(results[2].message.contains("boom"));
    assert_eq!(results[3].status, ValidatorStatus::Warning);
    assert!(results.iter().all(|r| r.gate_number == 2));
}

#[test]
fn test_mutating_validators_run_after_read_only() {
    let repo = create_test_repo_with_files(&[]);
    let ctx = context(repo.path(), make_run(repo.path(), "t", &[]), &[]);
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut registry = ValidatorRegistry::new();
    for (code, mutates) in [("M1", true), ("R1", false), ("M2", true), ("R2", false)] {
        registry.register(Arc::new(Fixed {
            code,
            mutates,
            behavior: || Ok(ValidatorOutcome::passed("ok")),
            log: Some(Arc::clone(&log)),
        }));
    }

    let results = execute_gate(&registry, Gate::Execution, &ctx, |_| {});
    let order = log.lock().unwrap().clone();

    let pos = |c: &str| order.iter().position(|x| *x == c).unwrap();
    assert!(pos("R1") < pos("M1"));
    assert!(pos("R2") < pos("M1"));
    assert!(pos("M1") < pos("M2"));

    let codes: Vec<_> = results.iter().map(|r| r.validator_code.as_str()).collect();
    assert_eq!(codes, vec!["M1", "R1", "M2", "R2"]);
}

#[test]
fn test_cancelled_context_skips_validators() {
    let repo = create_test_repo_with_files(&[]);
    let ctx = context(repo.path(), make_run(repo.path(), "t", &[]), &[]);
    ctx.cancel_token().cancel();

    let validator = fixed("OK", || Ok(ValidatorOutcome::passed("fine")));
    let result = execute_validator(validator.as_ref(), &ctx);
    assert_eq!(result.status, ValidatorStatus::Skipped);
}

// ============================================================================
// Context
// ============================================================================

#[test]
fn test_read_file_rejects_escapes() {
    let repo = create_test_repo_with_files(&[("src/a.ts", "export const a = 1;\n")]);
    let ctx = context(repo.path(), make_run(repo.path(), "t", &[]), &[]);

    assert!(ctx.read_file("src/a.ts").unwrap().contains("export"));
    assert!(ctx.read_file("../outside.txt").is_err());
    assert!(ctx.read_file("src/../../outside.txt").is_err());
    assert!(ctx.read_file("/etc/passwd").is_err());
}

#[test]
fn test_changes_hide_dependency_dir() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "node_modules/left-pad/index.js", "module.exports = 1;\n");
    write_file(repo.path(), "src/new.ts", "export {};\n");

    let ctx = context(repo.path(), make_run(repo.path(), "t", &[]), &[]);
    let paths: Vec<_> = ctx.changes().unwrap().iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths, vec!["src/new.ts"]);
}

#[test]
fn test_committed_and_working_tree_changes_are_separate() {
    let repo = create_test_repo_with_files(&[]);
    commit_on_branch(repo.path(), "work", &[("src/a.ts", "export const a = 1;\n")]);
    write_file(repo.path(), "README.md", "# Edited\n");
    write_file(repo.path(), "node_modules/left-pad/index.js", "module.exports = 1;\n");

    let mut run = make_run(repo.path(), "t", &[]);
    run.target_ref = "work".to_string();
    let ctx = context(repo.path(), run, &[]);

    let committed: Vec<_> = ctx
        .changed_between_refs()
        .unwrap()
        .into_iter()
        .map(|c| c.path)
        .collect();
    assert_eq!(committed, vec!["src/a.ts"]);

    let uncommitted: Vec<_> = ctx
        .working_tree_changes()
        .unwrap()
        .into_iter()
        .map(|c| c.path)
        .collect();
    assert_eq!(uncommitted, vec!["README.md"]);
}

// ============================================================================
// Gate 0
// ============================================================================

#[test]
fn test_task_prompt_present() {
    let repo = create_test_repo_with_files(&[]);
    let ctx = context(repo.path(), make_run(repo.path(), "   ", &[]), &[]);
    assert_eq!(run_builtin("TASK_PROMPT_PRESENT", &ctx).status, ValidatorStatus::Failed);

    let ctx = context(repo.path(), make_run(repo.path(), "Add a login form", &[]), &[]);
    assert_eq!(run_builtin("TASK_PROMPT_PRESENT", &ctx).status, ValidatorStatus::Passed);
}

#[test]
fn test_manifest_valid_reports_each_problem() {
    let repo = create_test_repo_with_files(&[]);
    let run = make_run(
        repo.path(),
        "t",
        &[
            ("src/a.ts", FileAction::Create),
            ("/etc/hosts", FileAction::Modify),
            ("src/../../x.ts", FileAction::Create),
            ("./src/a.ts", FileAction::Modify),
        ],
    );
    let result = run_builtin("MANIFEST_VALID", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 3);

    let empty = make_run(repo.path(), "t", &[]);
    let result = run_builtin("MANIFEST_VALID", &context(repo.path(), empty, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
}

#[test]
fn test_manifest_paths_consistent_with_base() {
    let repo = create_test_repo_with_files(&[("src/a.ts", "a\n")]);

    let good = make_run(
        repo.path(),
        "t",
        &[("src/a.ts", FileAction::Modify), ("src/b.ts", FileAction::Create)],
    );
    let result = run_builtin("MANIFEST_PATHS_CONSISTENT", &context(repo.path(), good, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed);

    let bad = make_run(
        repo.path(),
        "t",
        &[("src/a.ts", FileAction::Create), ("src/gone.ts", FileAction::Delete)],
    );
    let result = run_builtin("MANIFEST_PATHS_CONSISTENT", &context(repo.path(), bad, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 2);
}

#[test]
fn test_sensitive_files_union_with_configured_patterns() {
    let repo = create_test_repo_with_files(&[]);
    let run = make_run(
        repo.path(),
        "t",
        &[
            ("config/.env", FileAction::Create),
            ("deploy/prod.tfvars", FileAction::Create),
            ("src/env.ts", FileAction::Create),
        ],
    );
    let ctx = context(repo.path(), run, &[("SENSITIVE_FILE_PATTERNS", "*.tfvars")]);
    let result = run_builtin("SENSITIVE_FILES", &ctx);
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 2);
    assert!(result.details.iter().all(|d| !d.starts_with("src/env.ts")));
}

// ============================================================================
// Gate 1
// ============================================================================

#[test]
fn test_test_file_in_manifest() {
    let repo = create_test_repo_with_files(&[]);
    let run = make_run(repo.path(), "t", &[("src/a.ts", FileAction::Create)]);
    let result = run_builtin("TEST_FILE_IN_MANIFEST", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);

    let run = make_run(
        repo.path(),
        "t",
        &[("src/a.ts", FileAction::Create), ("src/a.test.ts", FileAction::Create)],
    );
    let result = run_builtin("TEST_FILE_IN_MANIFEST", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed);
}

#[test]
fn test_happy_and_sad_path_detection() {
    let repo = create_test_repo_with_files(&[]);
    write_file(
        repo.path(),
        "src/user.test.ts",
        "it('should return the user', () => {});\ntest(\"throws on invalid id\", () => {});\n",
    );
    write_file(
        repo.path(),
        "src/only_happy.test.ts",
        "it('returns data', () => {});\n",
    );

    let run = make_run(repo.path(), "t", &[("src/user.test.ts", FileAction::Create)]);
    let result = run_builtin("TEST_HAPPY_AND_SAD_PATH", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed, "{:?}", result.details);

    let run = make_run(repo.path(), "t", &[("src/only_happy.test.ts", FileAction::Create)]);
    let result = run_builtin("TEST_HAPPY_AND_SAD_PATH", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert!(result.details[0].contains("no sad-path test"));

    // Configured keywords extend the defaults.
    write_file(
        repo.path(),
        "src/custom.test.ts",
        "it('returns data', () => {});\nit('when broken', () => {});\n",
    );
    let run = make_run(repo.path(), "t", &[("src/custom.test.ts", FileAction::Create)]);
    let ctx = context(repo.path(), run, &[("TEST_SAD_PATH_KEYWORDS", "broken")]);
    assert_eq!(run_builtin("TEST_HAPPY_AND_SAD_PATH", &ctx).status, ValidatorStatus::Passed);
}

#[test]
fn test_happy_and_sad_path_python_tests() {
    let repo = create_test_repo_with_files(&[]);
    write_file(
        repo.path(),
        "tests/test_user.py",
        "def test_returns_user():\n    pass\n\ndef test_missing_user_raises():\n    pass\n",
    );
    let run = make_run(repo.path(), "t", &[("tests/test_user.py", FileAction::Create)]);
    let result = run_builtin("TEST_HAPPY_AND_SAD_PATH", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed, "{:?}", result.details);
}

#[test]
fn test_import_reality_check() {
    let repo = create_test_repo_with_files(&[
        ("package.json", r#"{"dependencies": {"react": "^18.0.0"}}"#),
        ("src/util.ts", "export const x = 1;\n"),
    ]);
    write_file(
        repo.path(),
        "src/app.test.ts",
        "import React from 'react';\nimport { x } from './util';\nimport { y } from './planned';\nimport fs from 'node:fs';\nimport { z } from '@/missing';\nimport _ from 'lodash';\n",
    );
    let run = make_run(
        repo.path(),
        "t",
        &[("src/app.test.ts", FileAction::Create), ("src/planned.ts", FileAction::Create)],
    );
    let result = run_builtin("IMPORT_REALITY_CHECK", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 2, "{:?}", result.details);
    assert!(result.details.iter().any(|d| d.contains("@/missing")));
    assert!(result.details.iter().any(|d| d.contains("lodash")));
}

#[test]
fn test_import_reality_check_extra_builtins_and_dependency_dir() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "node_modules/left-pad/index.js", "module.exports = 1;\n");
    write_file(
        repo.path(),
        "src/a.test.ts",
        "import pad from 'left-pad';\nimport bun from 'bun:test';\n",
    );
    let run = make_run(repo.path(), "t", &[("src/a.test.ts", FileAction::Create)]);
    let ctx = context(repo.path(), run, &[("EXTRA_BUILTIN_MODULES", "bun:test")]);
    let result = run_builtin("IMPORT_REALITY_CHECK", &ctx);
    assert_eq!(result.status, ValidatorStatus::Passed, "{:?}", result.details);
}

#[test]
fn test_test_type_detection_warns_on_unknown() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "src/a.test.ts", "it('works', () => {});\n");
    write_file(repo.path(), "src/__tests__/b.js", "check();\n");

    let run = make_run(repo.path(), "t", &[("src/a.test.ts", FileAction::Create)]);
    let result = run_builtin("TEST_TYPE_DETECTION", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed);

    let run = make_run(repo.path(), "t", &[("src/__tests__/b.js", FileAction::Create)]);
    let result = run_builtin("TEST_TYPE_DETECTION", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Warning);
    assert!(!result.is_hard_block);
}

// ============================================================================
// Gate 2
// ============================================================================

#[test]
fn test_diff_scope_enforcement() {
    let repo = create_test_repo_with_files(&[("src/a.ts", "a\n")]);
    write_file(repo.path(), "src/a.ts", "changed\n");
    write_file(repo.path(), "README.md", "# Sneaky\n");

    let run = make_run(repo.path(), "t", &[("src/a.ts", FileAction::Modify)]);
    let result = run_builtin("DIFF_SCOPE_ENFORCEMENT", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details, vec!["README.md"]);

    git(repo.path(), &["checkout", "--", "README.md"]);
    let run = make_run(
        repo.path(),
        "t",
        &[("src/a.ts", FileAction::Modify), ("src/b.ts", FileAction::Create)],
    );
    let result = run_builtin("DIFF_SCOPE_ENFORCEMENT", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Warning);
    assert!(result.details[0].contains("src/b.ts"));
}

#[test]
fn test_read_only_enforcement_default_exclusion() {
    let repo = create_test_repo_with_files(&[
        ("artifacts/2025/test.spec.tsx", "old\n"),
        ("src/Button.spec.tsx", "old\n"),
    ]);
    write_file(repo.path(), "artifacts/2025/test.spec.tsx", "new\n");
    write_file(repo.path(), "src/Button.spec.tsx", "new\n");

    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("TEST_READ_ONLY_ENFORCEMENT", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 1);
    assert!(result.details[0].starts_with("src/Button.spec.tsx"));
}

#[test]
fn test_read_only_enforcement_allows_new_tests() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "src/new.spec.ts", "it('works', () => {});\n");

    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("TEST_READ_ONLY_ENFORCEMENT", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed);
}

#[test]
fn test_delete_dependency_check() {
    let repo = create_test_repo_with_files(&[
        ("src/util.ts", "export const x = 1;\n"),
        ("src/app.ts", "import { x } from './util';\n"),
    ]);
    std::fs::remove_file(repo.path().join("src/util.ts")).unwrap();
    write_file(
        repo.path(),
        "node_modules/pkg/index.js",
        "const u = require('../../src/util');\n",
    );

    let run = make_run(repo.path(), "t", &[("src/util.ts", FileAction::Delete)]);
    let result = run_builtin("DELETE_DEPENDENCY_CHECK", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.details.len(), 1);
    assert!(result.details[0].starts_with("src/app.ts:1"));

    write_file(repo.path(), "src/app.ts", "export const y = 2;\n");
    let run = make_run(repo.path(), "t", &[("src/util.ts", FileAction::Delete)]);
    let result = run_builtin("DELETE_DEPENDENCY_CHECK", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Passed);
}

#[test]
fn test_stub_detection_is_a_warning() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "src/a.ts", "export function f() {\n  // TODO: real logic\n}\n");
    write_file(repo.path(), "notes.md", "TODO: write docs\n");

    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("STUB_DETECTION", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Warning);
    assert_eq!(result.details.len(), 1);
    assert!(result.details[0].starts_with("src/a.ts:2"));
    assert!(!result.is_blocking());
}

#[test]
fn test_execution_without_command_follows_policy_flag() {
    let repo = create_test_repo_with_files(&[]);
    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("TEST_EXECUTION", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Skipped);

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(repo.path(), run, &[("TEST_SKIP_IF_NO_COMMAND", "false")]);
    let result = run_builtin("TEST_EXECUTION", &ctx);
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert!(result.message.contains("TEST_SKIP_IF_NO_COMMAND"));
}

#[test]
fn test_npm_placeholder_test_script_is_not_a_command() {
    let repo = create_test_repo_with_files(&[(
        "package.json",
        r#"{"scripts": {"test": "echo \"Error: no test specified\" && exit 1"}}"#,
    )]);
    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("TEST_EXECUTION", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Skipped);
}

#[cfg(unix)]
#[test]
fn test_execution_exit_status_and_timeout() {
    let repo = create_test_repo_with_files(&[]);

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(repo.path(), run, &[("TEST_COMMAND", "sh -c 'exit 0'")]);
    assert_eq!(run_builtin("TEST_EXECUTION", &ctx).status, ValidatorStatus::Passed);

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(
        repo.path(),
        run,
        &[("TEST_COMMAND", "sh -c 'echo 1 failing; exit 3'")],
    );
    let result = run_builtin("TEST_EXECUTION", &ctx);
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert!(result.message.contains("exit code 3"));
    assert!(result.details.iter().any(|d| d.contains("1 failing")));

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(
        repo.path(),
        run,
        &[
            ("TEST_COMMAND", "sh -c 'exec sleep 5'"),
            ("TEST_EXECUTION_TIMEOUT_MS", "200"),
        ],
    );
    let result = run_builtin("TEST_EXECUTION", &ctx);
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert_eq!(result.message, "test suite timed out after 200ms");
}

#[test]
fn test_missing_tool_binary_fails() {
    let repo = create_test_repo_with_files(&[]);
    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(
        repo.path(),
        run,
        &[("BUILD_COMMAND", "gatekeep-no-such-binary --flag")],
    );
    let result = run_builtin("BUILD_CHECK", &ctx);
    assert_eq!(result.status, ValidatorStatus::Failed);
    assert!(result.message.contains("could not be started"));
}

// ============================================================================
// Gate 3
// ============================================================================

#[test]
fn test_compilation_and_build_skip_without_config() {
    let repo = create_test_repo_with_files(&[]);
    for code in ["COMPILATION_CHECK", "BUILD_CHECK", "LINT_CHECK"] {
        let run = make_run(repo.path(), "t", &[]);
        let result = run_builtin(code, &context(repo.path(), run, &[]));
        assert_eq!(result.status, ValidatorStatus::Skipped, "{}", code);
    }

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(repo.path(), run, &[("LINT_SKIP_IF_NO_CONFIG", "false")]);
    assert_eq!(run_builtin("LINT_CHECK", &ctx).status, ValidatorStatus::Failed);
}

#[cfg(unix)]
#[test]
fn test_lint_appends_changed_files() {
    let repo = create_test_repo_with_files(&[]);
    write_file(repo.path(), "src/a.ts", "export {};\n");
    write_file(repo.path(), "docs/readme.md", "text\n");

    let run = make_run(repo.path(), "t", &[]);
    let ctx = context(
        repo.path(),
        run,
        &[("LINT_COMMAND", "sh -c 'test \"$0\" = src/a.ts'")],
    );
    let result = run_builtin("LINT_CHECK", &ctx);
    assert_eq!(result.status, ValidatorStatus::Passed, "{}", result.message);
    assert_eq!(result.context["files"], serde_json::json!(["src/a.ts"]));
}

#[test]
fn test_lint_without_changed_sources_skips() {
    let repo = create_test_repo_with_files(&[(".eslintrc.json", "{}")]);
    let run = make_run(repo.path(), "t", &[]);
    let result = run_builtin("LINT_CHECK", &context(repo.path(), run, &[]));
    assert_eq!(result.status, ValidatorStatus::Skipped);
}
