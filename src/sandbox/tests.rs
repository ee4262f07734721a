//! Tests for sandbox creation and cleanup.

use super::*;
use crate::test_support::{commit_on_branch, create_test_repo};
use std::io;
use std::path::Path;
use tempfile::TempDir;

struct FailingLinker;

impl DependencyLinker for FailingLinker {
    fn link(&self, _source: &Path, _link: &Path) -> io::Result<bool> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
    }
}

struct UnsupportedLinker;

impl DependencyLinker for UnsupportedLinker {
    fn link(&self, _source: &Path, _link: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

fn sandbox_base() -> TempDir {
    TempDir::new().unwrap()
}

#[test]
fn test_create_without_dependency_dir() {
    let repo = create_test_repo();
    let base = sandbox_base();
    let manager = SandboxManager::default();

    let outcome = manager.create(repo.path(), base.path(), "main");

    assert!(outcome.success, "{:?}", outcome.error);
    assert!(!outcome.junction_created);
    assert!(!outcome.reused);
    assert_eq!(outcome.sandbox_path, base.path().join("main"));
    assert!(outcome.sandbox_path.join("README.md").exists());
}

#[test]
fn test_create_checks_out_requested_ref() {
    let repo = create_test_repo();
    commit_on_branch(repo.path(), "feature/x", &[("src/new.ts", "export const x = 1;\n")]);
    let base = sandbox_base();

    let outcome = SandboxManager::default().create(repo.path(), base.path(), "feature/x");

    assert!(outcome.success);
    assert_eq!(outcome.sandbox_path, base.path().join("feature-x"));
    assert!(outcome.sandbox_path.join("src/new.ts").exists());
    // The main checkout is untouched.
    assert!(!repo.path().join("src/new.ts").exists());
}

#[cfg(unix)]
#[test]
fn test_create_links_dependency_dir() {
    let repo = create_test_repo();
    std::fs::create_dir_all(repo.path().join("node_modules/left-pad")).unwrap();
    std::fs::write(repo.path().join("node_modules/left-pad/index.js"), "x").unwrap();
    let base = sandbox_base();

    let outcome = SandboxManager::default().create(repo.path(), base.path(), "main");

    assert!(outcome.success);
    assert!(outcome.junction_created);
    let link = outcome.sandbox_path.join("node_modules");
    assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert!(link.join("left-pad/index.js").exists());
}

#[cfg(unix)]
#[test]
fn test_cleanup_never_deletes_real_dependency_tree() {
    let repo = create_test_repo();
    std::fs::create_dir_all(repo.path().join("node_modules/pkg")).unwrap();
    std::fs::write(repo.path().join("node_modules/pkg/index.js"), "keep me").unwrap();
    let base = sandbox_base();
    let manager = SandboxManager::default();

    let outcome = manager.create(repo.path(), base.path(), "main");
    assert!(outcome.junction_created);

    manager.cleanup(&outcome.sandbox_path);

    assert!(!outcome.sandbox_path.exists());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("node_modules/pkg/index.js")).unwrap(),
        "keep me"
    );
}

#[test]
fn test_link_failure_is_degraded_not_fatal() {
    let repo = create_test_repo();
    std::fs::create_dir_all(repo.path().join("node_modules")).unwrap();
    let base = sandbox_base();
    let manager = SandboxManager::new(Box::new(FailingLinker), "node_modules");

    let outcome = manager.create(repo.path(), base.path(), "main");

    assert!(outcome.success);
    assert!(!outcome.junction_created);
    assert!(outcome.error.is_none());
}

#[test]
fn test_unsupported_platform_linker() {
    let repo = create_test_repo();
    std::fs::create_dir_all(repo.path().join("node_modules")).unwrap();
    let base = sandbox_base();
    let manager = SandboxManager::new(Box::new(UnsupportedLinker), "node_modules");

    let outcome = manager.create(repo.path(), base.path(), "main");
    assert!(outcome.success);
    assert!(!outcome.junction_created);
}

#[test]
fn test_existing_worktree_is_reused() {
    let repo = create_test_repo();
    let base = sandbox_base();
    let manager = SandboxManager::default();

    let first = manager.create(repo.path(), base.path(), "main");
    std::fs::write(first.sandbox_path.join("scratch.txt"), "partial").unwrap();

    let second = manager.create(repo.path(), base.path(), "main");

    assert!(second.success);
    assert!(second.reused);
    assert_eq!(first.sandbox_path, second.sandbox_path);
    assert!(second.sandbox_path.join("scratch.txt").exists());
}

#[test]
fn test_foreign_directory_at_path_fails() {
    let repo = create_test_repo();
    let base = sandbox_base();
    std::fs::create_dir_all(base.path().join("main")).unwrap();

    let outcome = SandboxManager::default().create(repo.path(), base.path(), "main");

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("not a worktree"));
}

#[test]
fn test_unknown_ref_fails() {
    let repo = create_test_repo();
    let base = sandbox_base();

    let outcome = SandboxManager::default().create(repo.path(), base.path(), "no-such-ref");

    assert!(!outcome.success);
    assert!(!outcome.junction_created);
    assert!(outcome.error.is_some());
}

#[test]
fn test_cleanup_removes_worktree_registration() {
    let repo = create_test_repo();
    let base = sandbox_base();
    let manager = SandboxManager::default();

    let outcome = manager.create(repo.path(), base.path(), "main");
    std::fs::write(outcome.sandbox_path.join("dirty.txt"), "untracked").unwrap();
    manager.cleanup(&outcome.sandbox_path);

    assert!(!outcome.sandbox_path.exists());
    assert!(!is_registered_worktree(repo.path(), &outcome.sandbox_path).unwrap());
    assert_eq!(list_worktrees(repo.path()).unwrap().len(), 1);

    // The same path can be materialized again afterwards.
    let again = manager.create(repo.path(), base.path(), "main");
    assert!(again.success);
    assert!(!again.reused);
}

#[test]
fn test_cleanup_tolerates_missing_sandbox() {
    let base = sandbox_base();
    SandboxManager::default().cleanup(&base.path().join("never-created"));
}

#[test]
fn test_cleanup_after_manual_removal_then_recreate() {
    let repo = create_test_repo();
    let base = sandbox_base();
    let manager = SandboxManager::default();

    let outcome = manager.create(repo.path(), base.path(), "main");
    std::fs::remove_dir_all(&outcome.sandbox_path).unwrap();

    // Stale registration is pruned before the next add.
    let again = manager.create(repo.path(), base.path(), "main");
    assert!(again.success, "{:?}", again.error);
}

#[test]
fn test_sandboxes_of_different_runs_are_distinct() {
    let repo = create_test_repo();
    let state = sandbox_base();
    let manager = SandboxManager::default();

    let a = manager.create(repo.path(), &state.path().join("run-a"), "main");
    let b = manager.create(repo.path(), &state.path().join("run-b"), "main");

    assert!(a.success && b.success);
    assert_ne!(a.sandbox_path, b.sandbox_path);
    assert!(!b.reused);
    assert_eq!(list_worktrees(repo.path()).unwrap().len(), 3);
}

#[cfg(unix)]
#[test]
fn test_remove_link_leaves_real_directories() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("node_modules");
    std::fs::create_dir_all(real.join("pkg")).unwrap();

    remove_link(&real).unwrap();
    assert!(real.join("pkg").exists());

    remove_link(&dir.path().join("missing")).unwrap();
}
