//! Diff queries against a repository or sandbox.

use crate::error::Result;
use crate::git::run_git;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::helpers::{normalize_path, parse_name_status, parse_porcelain_z};
use super::parser::parse_added_lines;

/// How a file changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { from: String },
}

/// One changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: &str, kind: ChangeKind) -> Self {
        Self {
            path: normalize_path(path),
            kind,
        }
    }

    /// True if content at a pre-existing path was altered or removed.
    pub fn touches_existing(&self) -> bool {
        matches!(
            self.kind,
            ChangeKind::Modified | ChangeKind::Deleted | ChangeKind::Renamed { .. }
        )
    }
}

/// A single added line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedLine {
    pub file_path: String,
    /// Line number in the new file (1-based).
    pub line_number: usize,
    pub content: String,
}

const NO_QUOTE: [&str; 2] = ["-c", "core.quotePath=false"];

/// Files changed between two refs (`git diff --name-status -M base..target`).
pub fn changed_files<P: AsRef<Path>>(cwd: P, base: &str, target: &str) -> Result<Vec<FileChange>> {
    let range = format!("{}..{}", base, target);
    let output = run_git(
        cwd,
        &[NO_QUOTE[0], NO_QUOTE[1], "diff", "--name-status", "-M", &range],
    )?;
    Ok(parse_name_status(&output.stdout))
}

/// Uncommitted changes in a working tree, untracked files included.
pub fn working_tree_changes<P: AsRef<Path>>(cwd: P) -> Result<Vec<FileChange>> {
    let output = run_git(
        cwd,
        &["status", "--porcelain", "-z", "--untracked-files=all"],
    )?;
    Ok(parse_porcelain_z(&output.stdout))
}

/// Everything that differs between `base` and the current working tree.
///
/// Combines committed changes since `base` with uncommitted and untracked
/// files; each path appears once.
pub fn changes_since<P: AsRef<Path>>(cwd: P, base: &str) -> Result<Vec<FileChange>> {
    let cwd = cwd.as_ref();
    let tracked = run_git(
        cwd,
        &[NO_QUOTE[0], NO_QUOTE[1], "diff", "--name-status", "-M", base],
    )?;

    let mut by_path: BTreeMap<String, FileChange> = parse_name_status(&tracked.stdout)
        .into_iter()
        .map(|c| (c.path.clone(), c))
        .collect();

    for untracked in untracked_files(cwd)? {
        by_path
            .entry(untracked.clone())
            .or_insert_with(|| FileChange::new(&untracked, ChangeKind::Added));
    }

    Ok(by_path.into_values().collect())
}

/// Lines added since `base`, including the full content of untracked files.
pub fn added_lines_since<P: AsRef<Path>>(cwd: P, base: &str) -> Result<Vec<AddedLine>> {
    let cwd = cwd.as_ref();
    let output = run_git(cwd, &[NO_QUOTE[0], NO_QUOTE[1], "diff", "-U0", base])?;
    let mut lines = parse_added_lines(&output.stdout);

    for path in untracked_files(cwd)? {
        // Binary or unreadable files have no meaningful lines.
        let Ok(content) = std::fs::read_to_string(cwd.join(&path)) else {
            continue;
        };
        lines.extend(content.lines().enumerate().map(|(i, line)| AddedLine {
            file_path: path.clone(),
            line_number: i + 1,
            content: line.to_string(),
        }));
    }

    Ok(lines)
}

fn untracked_files(cwd: &Path) -> Result<Vec<String>> {
    let output = run_git(
        cwd,
        &[
            NO_QUOTE[0],
            NO_QUOTE[1],
            "ls-files",
            "--others",
            "--exclude-standard",
        ],
    )?;
    Ok(output.lines().into_iter().map(normalize_path).collect())
}
