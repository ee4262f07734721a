//! Git diff inspection for validators.
//!
//! Validators see a change from two angles:
//! - which files changed, with their kind (added/modified/deleted/renamed),
//!   between two refs or between a ref and the sandbox working tree;
//! - which lines were added, with their new-file line numbers, parsed from
//!   `git diff -U0` output.
//!
//! Paths are repository-relative with forward slashes.

mod api;
mod helpers;
mod parser;

#[cfg(test)]
mod tests;

pub use api::{
    AddedLine, ChangeKind, FileChange, added_lines_since, changed_files, changes_since,
    working_tree_changes,
};
pub use helpers::normalize_path;
pub use parser::parse_added_lines;
