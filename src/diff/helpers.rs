//! Line-level parsers for git's machine-readable outputs.

use super::api::{ChangeKind, FileChange};

/// Normalize a path to forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Parse `git diff --name-status -M` output.
///
/// Lines look like `M\tpath`, `A\tpath`, `D\tpath` or `R097\told\tnew`.
pub(super) fn parse_name_status(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let code = fields.next()?.trim();
            let first = fields.next()?;
            let kind_char = code.chars().next()?;

            Some(match kind_char {
                'A' => FileChange::new(first, ChangeKind::Added),
                'D' => FileChange::new(first, ChangeKind::Deleted),
                'R' | 'C' => {
                    let to = fields.next()?;
                    let kind = if kind_char == 'R' {
                        ChangeKind::Renamed {
                            from: normalize_path(first),
                        }
                    } else {
                        ChangeKind::Added
                    };
                    FileChange::new(to, kind)
                }
                _ => FileChange::new(first, ChangeKind::Modified),
            })
        })
        .collect()
}

/// Parse `git status --porcelain -z --untracked-files=all` output.
///
/// Entries are NUL-separated `XY path`; renames and copies are followed by
/// an extra entry holding the source path.
pub(super) fn parse_porcelain_z(output: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    let mut entries = output.split('\0').filter(|e| !e.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let (xy, path) = entry.split_at(3);
        let mut codes = xy.chars();
        let x = codes.next().unwrap_or(' ');
        let y = codes.next().unwrap_or(' ');

        let kind = match (x, y) {
            ('?', '?') | ('A', _) => ChangeKind::Added,
            ('D', _) | (_, 'D') => ChangeKind::Deleted,
            ('R', _) => {
                let from = entries.next().map(normalize_path).unwrap_or_default();
                ChangeKind::Renamed { from }
            }
            ('C', _) => {
                entries.next();
                ChangeKind::Added
            }
            _ => ChangeKind::Modified,
        };
        changes.push(FileChange::new(path, kind));
    }

    changes
}

/// Parse a `diff --git a/<old> b/<new>` header remainder into the new path.
pub(super) fn parse_diff_git_line(rest: &str) -> Option<String> {
    // Paths may contain " b/", so split at the last occurrence.
    rest.rfind(" b/")
        .map(|pos| normalize_path(&rest[pos + 3..]))
}

/// Parse the new-file start line from a hunk header.
///
/// Accepts `@@ -a,b +c,d @@ ...` and `@@ -a +c @@`.
pub(super) fn parse_hunk_new_start(line: &str) -> Option<usize> {
    let body = line.strip_prefix("@@ ")?;
    let ranges = &body[..body.find(" @@")?];
    let new_range = ranges.split_whitespace().nth(1)?.strip_prefix('+')?;
    let start = new_range.split(',').next()?;
    start.parse().ok()
}
