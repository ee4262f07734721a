//! Added-line extraction from unified diffs.

use super::api::AddedLine;
use super::helpers::{normalize_path, parse_diff_git_line, parse_hunk_new_start};

/// Extract added lines from `git diff -U0` output.
///
/// Deleted files contribute nothing. Line numbers refer to the new file and
/// are 1-based.
pub fn parse_added_lines(diff_output: &str) -> Vec<AddedLine> {
    let mut result = Vec::new();
    let mut current_file: Option<String> = None;
    let mut new_line = 0usize;

    for line in diff_output.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            current_file = parse_diff_git_line(rest);
            new_line = 0;
        } else if line.starts_with("--- ") {
            // The old side never contributes added lines.
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            current_file = match rest {
                "/dev/null" => None,
                _ => rest.strip_prefix("b/").map(normalize_path).or(current_file),
            };
        } else if line.starts_with("@@ ") {
            if let Some(start) = parse_hunk_new_start(line) {
                new_line = start;
            }
        } else if let Some(file) = &current_file {
            if let Some(content) = line.strip_prefix('+') {
                result.push(AddedLine {
                    file_path: file.clone(),
                    line_number: new_line,
                    content: content.to_string(),
                });
                new_line += 1;
            } else if line.starts_with(' ') {
                new_line += 1;
            }
        }
    }

    result
}
