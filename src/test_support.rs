use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Switches the process working directory until dropped.
///
/// The working directory is process-global: tests using this are also
/// marked `#[serial]`.
pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(dir: &Path) -> Self {
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Create a repository on `main` with a single commit containing `README.md`.
pub(crate) fn create_test_repo() -> TempDir {
    create_test_repo_with_files(&[])
}

/// Create a repository whose initial commit contains `README.md` plus `files`.
pub(crate) fn create_test_repo_with_files(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    git(path, &["init"]);
    // Ensure the repo uses a deterministic default branch name across environments.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);

    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    for (file, content) in files {
        write_file(path, file, content);
    }
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

/// Write a file relative to `root`, creating parent directories.
pub(crate) fn write_file(root: &Path, relative: &str, content: &str) {
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(target, content).unwrap();
}

/// Create a branch at the current HEAD, write `files` on it and commit.
///
/// The original branch is checked out again afterwards.
pub(crate) fn commit_on_branch(repo: &Path, branch: &str, files: &[(&str, &str)]) {
    git(repo, &["checkout", "-b", branch]);
    for (file, content) in files {
        write_file(repo, file, content);
    }
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-m", &format!("Work on {}", branch)]);
    git(repo, &["checkout", "main"]);
}

/// Delete `files` on `branch` (which must exist) and commit.
pub(crate) fn delete_on_branch(repo: &Path, branch: &str, files: &[&str]) {
    git(repo, &["checkout", branch]);
    for file in files {
        git(repo, &["rm", "-q", file]);
    }
    git(repo, &["commit", "-m", &format!("Delete files on {}", branch)]);
    git(repo, &["checkout", "main"]);
}

pub(crate) fn git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }
}
