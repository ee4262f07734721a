//! Tests for diff parsing and queries.

use super::helpers::{parse_hunk_new_start, parse_name_status, parse_porcelain_z};
use super::*;
use crate::test_support::{commit_on_branch, create_test_repo_with_files, delete_on_branch, git, write_file};

#[test]
fn test_parse_added_lines_simple() {
    let diff = r#"diff --git a/src/lib.rs b/src/lib.rs
index abc1234..def5678 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -10,0 +11,2 @@ fn existing_function() {
+    let x = 42;
+    println!("Added line");
"#;

    let lines = parse_added_lines(diff);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].file_path, "src/lib.rs");
    assert_eq!(lines[0].line_number, 11);
    assert_eq!(lines[0].content, "    let x = 42;");
    assert_eq!(lines[1].line_number, 12);
}

#[test]
fn test_parse_added_lines_new_and_deleted_files() {
    let diff = r#"diff --git a/src/new.ts b/src/new.ts
new file mode 100644
--- /dev/null
+++ b/src/new.ts
@@ -0,0 +1,2 @@
+export const a = 1;
+
diff --git a/src/gone.ts b/src/gone.ts
deleted file mode 100644
--- a/src/gone.ts
+++ /dev/null
@@ -1,1 +0,0 @@
-export const gone = true;
"#;

    let lines = parse_added_lines(diff);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.file_path == "src/new.ts"));
    assert_eq!(lines[1].line_number, 2);
    assert_eq!(lines[1].content, "");
}

#[test]
fn test_parse_added_lines_multiple_hunks() {
    let diff = r#"diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -1 +1 @@
-old
+new
@@ -20,0 +21,1 @@
+    pass
"#;

    let lines = parse_added_lines(diff);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].line_number, 1);
    assert_eq!(lines[1].line_number, 21);
    assert_eq!(lines[1].content, "    pass");
}

#[test]
fn test_parse_hunk_header_variants() {
    assert_eq!(parse_hunk_new_start("@@ -10,0 +11,2 @@"), Some(11));
    assert_eq!(parse_hunk_new_start("@@ -1 +1 @@ fn main()"), Some(1));
    assert_eq!(parse_hunk_new_start("@@ garbage"), None);
}

#[test]
fn test_parse_name_status() {
    let output = "M\tsrc/a.ts\nA\tsrc/b.ts\nD\tsrc/c.ts\nR097\tsrc/old.ts\tsrc/new.ts";
    let changes = parse_name_status(output);

    assert_eq!(changes.len(), 4);
    assert_eq!(changes[0], FileChange::new("src/a.ts", ChangeKind::Modified));
    assert_eq!(changes[1].kind, ChangeKind::Added);
    assert_eq!(changes[2].kind, ChangeKind::Deleted);
    assert_eq!(
        changes[3],
        FileChange::new(
            "src/new.ts",
            ChangeKind::Renamed {
                from: "src/old.ts".to_string()
            }
        )
    );
    assert!(changes[3].touches_existing());
    assert!(!changes[1].touches_existing());
}

#[test]
fn test_parse_porcelain_z() {
    let output = " M src/a.ts\0?? src/new file.ts\0D  gone.ts\0R  to.ts\0from.ts\0A  staged.ts\0";
    let changes = parse_porcelain_z(output);

    assert_eq!(changes.len(), 5);
    assert_eq!(changes[0].kind, ChangeKind::Modified);
    assert_eq!(changes[1], FileChange::new("src/new file.ts", ChangeKind::Added));
    assert_eq!(changes[2].kind, ChangeKind::Deleted);
    assert_eq!(
        changes[3].kind,
        ChangeKind::Renamed {
            from: "from.ts".to_string()
        }
    );
    assert_eq!(changes[4].kind, ChangeKind::Added);
}

#[test]
fn test_changed_files_between_refs() {
    let repo = create_test_repo_with_files(&[("src/keep.ts", "a\n"), ("src/drop.ts", "b\n")]);
    commit_on_branch(repo.path(), "work", &[("src/keep.ts", "a2\n"), ("src/add.ts", "c\n")]);
    delete_on_branch(repo.path(), "work", &["src/drop.ts"]);

    let mut changes = changed_files(repo.path(), "main", "work").unwrap();
    changes.sort_by(|a, b| a.path.cmp(&b.path));

    assert_eq!(
        changes,
        vec![
            FileChange::new("src/add.ts", ChangeKind::Added),
            FileChange::new("src/drop.ts", ChangeKind::Deleted),
            FileChange::new("src/keep.ts", ChangeKind::Modified),
        ]
    );
}

#[test]
fn test_changes_since_includes_working_tree() {
    let repo = create_test_repo_with_files(&[("src/a.ts", "a\n")]);
    commit_on_branch(repo.path(), "work", &[("src/b.ts", "b\n")]);
    git(repo.path(), &["checkout", "work"]);

    write_file(repo.path(), "src/a.ts", "changed\n");
    write_file(repo.path(), "src/c.ts", "untracked\n");

    let changes = changes_since(repo.path(), "main").unwrap();
    let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.ts", "src/b.ts", "src/c.ts"]);
    assert_eq!(changes[2].kind, ChangeKind::Added);

    let wt = working_tree_changes(repo.path()).unwrap();
    assert_eq!(wt.len(), 2);
}

#[test]
fn test_added_lines_since_includes_untracked() {
    let repo = create_test_repo_with_files(&[("src/a.ts", "one\n")]);
    write_file(repo.path(), "src/a.ts", "one\ntwo // TODO\n");
    write_file(repo.path(), "src/new.ts", "first\nsecond\n");

    let lines = added_lines_since(repo.path(), "HEAD").unwrap();

    assert!(lines.iter().any(|l| l.file_path == "src/a.ts"
        && l.line_number == 2
        && l.content == "two // TODO"));
    let untracked: Vec<_> = lines.iter().filter(|l| l.file_path == "src/new.ts").collect();
    assert_eq!(untracked.len(), 2);
    assert_eq!(untracked[1].line_number, 2);
}
