//! Tests for configuration.

use super::*;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_list_is_deduplicated_union_with_defaults() {
    let snapshot = ConfigSnapshot::from_pairs(&[(keys::DELETE_CHECK_IGNORE_DIRS, "custom_dir")]);
    let dirs = snapshot.list(keys::DELETE_CHECK_IGNORE_DIRS, defaults::DELETE_CHECK_IGNORE_DIRS);

    assert_eq!(
        dirs,
        vec![
            "node_modules",
            ".git",
            "dist",
            "build",
            "coverage",
            ".next",
            ".cache",
            "custom_dir"
        ]
    );
}

#[test]
fn test_list_union_removes_overlap_regardless_of_order() {
    let snapshot = ConfigSnapshot::from_pairs(&[(
        keys::DELETE_CHECK_IGNORE_DIRS,
        " dist , custom ,node_modules,custom,,",
    )]);
    let dirs = snapshot.list(keys::DELETE_CHECK_IGNORE_DIRS, defaults::DELETE_CHECK_IGNORE_DIRS);

    assert_eq!(dirs.len(), defaults::DELETE_CHECK_IGNORE_DIRS.len() + 1);
    assert_eq!(dirs.iter().filter(|d| *d == "dist").count(), 1);
    assert_eq!(dirs.iter().filter(|d| *d == "custom").count(), 1);
}

#[test]
fn test_list_unset_key_yields_defaults() {
    let snapshot = ConfigSnapshot::default();
    let paths = snapshot.list(
        keys::TEST_READ_ONLY_EXCLUDED_PATHS,
        defaults::TEST_READ_ONLY_EXCLUDED_PATHS,
    );
    assert_eq!(paths, vec!["artifacts/**"]);
}

#[test]
fn test_map_overrides_and_extends_defaults() {
    let snapshot =
        ConfigSnapshot::from_pairs(&[(keys::PATH_ALIASES, "@:app/src, #lib:lib ,broken")]);
    let aliases = snapshot.map(keys::PATH_ALIASES, defaults::PATH_ALIASES);

    assert_eq!(aliases.get("@").map(String::as_str), Some("app/src"));
    assert_eq!(aliases.get("~").map(String::as_str), Some("src"));
    assert_eq!(aliases.get("#lib").map(String::as_str), Some("lib"));
    assert_eq!(aliases.len(), 3);
}

#[test]
fn test_map_value_may_contain_colons() {
    let snapshot = ConfigSnapshot::from_pairs(&[(keys::TEST_TYPE_PATTERNS, "smoke:a:b")]);
    let patterns = snapshot.map(keys::TEST_TYPE_PATTERNS, &[]);
    assert_eq!(patterns.get("smoke").map(String::as_str), Some("a:b"));
}

#[test]
fn test_malformed_scalars_fall_back_to_defaults() {
    let snapshot = ConfigSnapshot::from_pairs(&[
        (keys::LINT_SKIP_IF_NO_CONFIG, "maybe"),
        (keys::LINT_TIMEOUT_MS, "soon"),
        (keys::BUILD_TIMEOUT_MS, "-5"),
        (keys::TEST_EXECUTION_TIMEOUT_MS, "0"),
    ]);

    assert!(snapshot.flag(keys::LINT_SKIP_IF_NO_CONFIG, true));
    assert_eq!(snapshot.number(keys::LINT_TIMEOUT_MS, 60_000), 60_000);
    assert_eq!(snapshot.number(keys::BUILD_TIMEOUT_MS, 7), 7);
    assert_eq!(
        snapshot.duration_ms(keys::TEST_EXECUTION_TIMEOUT_MS, 1500),
        Duration::from_millis(1500)
    );
}

#[test]
fn test_well_formed_scalars() {
    let snapshot = ConfigSnapshot::from_pairs(&[
        (keys::LINT_SKIP_IF_NO_CONFIG, "false"),
        (keys::LINT_TIMEOUT_MS, " 2500 "),
        (keys::TEST_COMMAND, "  npm test  "),
    ]);

    assert!(!snapshot.flag(keys::LINT_SKIP_IF_NO_CONFIG, true));
    assert_eq!(snapshot.number(keys::LINT_TIMEOUT_MS, 1), 2500);
    assert_eq!(snapshot.string(keys::TEST_COMMAND, ""), "npm test");
    assert_eq!(snapshot.string(keys::BUILD_COMMAND, "npm run build"), "npm run build");
}

#[test]
fn test_seed_values_match_compiled_lists() {
    let store = ConfigStore::in_memory();
    store.seed().unwrap();
    let snapshot = store.snapshot();

    let expected: &[(&str, &[&str])] = &[
        (keys::DELETE_CHECK_IGNORE_DIRS, defaults::DELETE_CHECK_IGNORE_DIRS),
        (keys::TEST_HAPPY_PATH_KEYWORDS, defaults::TEST_HAPPY_PATH_KEYWORDS),
        (keys::TEST_SAD_PATH_KEYWORDS, defaults::TEST_SAD_PATH_KEYWORDS),
        (keys::TEST_FILE_PATTERNS, defaults::TEST_FILE_PATTERNS),
        (keys::LINT_CONFIG_FILES, defaults::LINT_CONFIG_FILES),
        (keys::TEST_READ_ONLY_EXCLUDED_PATHS, defaults::TEST_READ_ONLY_EXCLUDED_PATHS),
        (keys::SENSITIVE_FILE_PATTERNS, defaults::SENSITIVE_FILE_PATTERNS),
        (keys::STUB_PATTERNS, defaults::STUB_PATTERNS),
        (keys::STUB_CHECK_EXTENSIONS, defaults::STUB_CHECK_EXTENSIONS),
    ];
    for (key, list) in expected {
        assert_eq!(snapshot.get(key), Some(list.join(",").as_str()), "{}", key);
    }

    let aliases = snapshot.map(keys::PATH_ALIASES, &[]);
    assert_eq!(aliases.len(), defaults::PATH_ALIASES.len());
    let patterns = snapshot.map(keys::TEST_TYPE_PATTERNS, &[]);
    for (name, regex) in defaults::TEST_TYPE_PATTERNS {
        assert_eq!(patterns.get(*name).map(String::as_str), Some(*regex));
    }
}

#[test]
fn test_seed_numbers_match_compiled_constants() {
    let store = ConfigStore::in_memory();
    store.seed().unwrap();
    let snapshot = store.snapshot();

    assert_eq!(
        snapshot.number(keys::TEST_EXECUTION_TIMEOUT_MS, 0),
        defaults::TEST_EXECUTION_TIMEOUT_MS
    );
    assert_eq!(
        snapshot.number(keys::COMPILATION_TIMEOUT_MS, 0),
        defaults::COMPILATION_TIMEOUT_MS
    );
    assert_eq!(snapshot.number(keys::BUILD_TIMEOUT_MS, 0), defaults::BUILD_TIMEOUT_MS);
    assert_eq!(snapshot.number(keys::LINT_TIMEOUT_MS, 0), defaults::LINT_TIMEOUT_MS);
    assert_eq!(snapshot.number(keys::EVENT_RETENTION, 0), defaults::EVENT_RETENTION);
}

#[test]
fn test_every_seed_value_is_valid_for_its_type() {
    for entry in DEFAULTS {
        entry.value_type.check(entry.key, entry.value).unwrap();
    }
}

#[test]
fn test_seed_does_not_overwrite() {
    let store = ConfigStore::in_memory();
    store.set(keys::TEST_COMMAND, "make test").unwrap();

    let inserted = store.seed().unwrap();
    assert!(!inserted.contains(&keys::TEST_COMMAND.to_string()));
    assert_eq!(store.get(keys::TEST_COMMAND).unwrap().value, "make test");

    assert!(store.seed().unwrap().is_empty());
}

#[test]
fn test_set_checks_declared_type() {
    let store = ConfigStore::in_memory();
    store.seed().unwrap();

    let err = store.set(keys::LINT_TIMEOUT_MS, "fast").unwrap_err();
    assert!(matches!(err, crate::error::GateError::ConfigError(_)));

    let entry = store.set(keys::LINT_TIMEOUT_MS, "5000").unwrap();
    assert_eq!(entry.value_type, ValueType::Number);
    assert_eq!(entry.category, "integrity");
}

#[test]
fn test_set_unknown_key_is_custom_string() {
    let store = ConfigStore::in_memory();
    let entry = store.set("MY_FLAG", "anything").unwrap();
    assert_eq!(entry.value_type, ValueType::String);
    assert_eq!(entry.category, "custom");
}

#[test]
fn test_snapshot_is_isolated_from_later_writes() {
    let store = ConfigStore::in_memory();
    store.set(keys::TEST_COMMAND, "npm test").unwrap();

    let before = store.snapshot();
    store.set(keys::TEST_COMMAND, "yarn test").unwrap();

    assert_eq!(before.get(keys::TEST_COMMAND), Some("npm test"));
    assert_eq!(store.snapshot().get(keys::TEST_COMMAND), Some("yarn test"));
}

#[test]
fn test_file_store_persists_and_reloads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");

    let store = ConfigStore::open(&path).unwrap();
    store.seed().unwrap();
    store.set(keys::DELETE_CHECK_IGNORE_DIRS, "custom_dir").unwrap();
    assert!(path.exists());

    let reopened = ConfigStore::open(&path).unwrap();
    assert_eq!(
        reopened.get(keys::DELETE_CHECK_IGNORE_DIRS).unwrap().value,
        "custom_dir"
    );
    assert_eq!(reopened.list().len(), DEFAULTS.len());
}

#[test]
fn test_snapshot_picks_up_edits_from_other_handles() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");

    let reader = ConfigStore::open(&path).unwrap();
    let writer = ConfigStore::open(&path).unwrap();
    writer.set(keys::BUILD_COMMAND, "make").unwrap();

    assert_eq!(reader.snapshot().get(keys::BUILD_COMMAND), Some("make"));
}

#[test]
fn test_corrupt_file_keeps_previous_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");

    let store = ConfigStore::open(&path).unwrap();
    store.set(keys::BUILD_COMMAND, "make").unwrap();
    std::fs::write(&path, "entries: [not, a, map").unwrap();

    assert_eq!(store.snapshot().get(keys::BUILD_COMMAND), Some("make"));
    assert!(ConfigStore::open(&path).is_err());
}

#[test]
fn test_yaml_ignores_unknown_fields() {
    let yaml = r#"
version: 1
future_field: true
entries:
  TEST_COMMAND:
    value: npm test
    type: STRING
    category: execution
    extra: ignored
  BARE:
    value: x
"#;
    let file = ConfigFile::from_yaml(yaml).unwrap();
    assert_eq!(file.entries["TEST_COMMAND"].value, "npm test");
    assert_eq!(file.entries["BARE"].category, "custom");
    assert_eq!(file.entries["BARE"].value_type, ValueType::String);
}
