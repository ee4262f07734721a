//! Gate 1: contract validation of the declared tests.

use super::super::context::ValidationContext;
use super::super::imports::{
    ImportTarget, SourceKind, python_candidates, script_candidates,
};
use super::super::types::{Validator, ValidatorOutcome};
use crate::config::{defaults, keys};
use crate::diff::normalize_path;
use crate::run::{FileAction, Gate};
use anyhow::Result;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::warn;

/// Declared test files that will exist after the change.
fn manifest_tests(ctx: &ValidationContext) -> Vec<String> {
    ctx.run()
        .manifest
        .iter()
        .filter(|e| e.action != FileAction::Delete)
        .map(|e| normalize_path(&e.path))
        .filter(|p| ctx.is_test_file(p))
        .collect()
}

pub struct TestFileInManifest;

impl Validator for TestFileInManifest {
    fn code(&self) -> &'static str {
        "TEST_FILE_IN_MANIFEST"
    }

    fn gate(&self) -> Gate {
        Gate::Contract
    }

    fn description(&self) -> &'static str {
        "The manifest declares at least one test file"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let tests = manifest_tests(ctx);
        if tests.is_empty() {
            return Ok(ValidatorOutcome::failed("manifest declares no test file")
                .with_context(json!({
                    "patterns": ctx.config().list(keys::TEST_FILE_PATTERNS, defaults::TEST_FILE_PATTERNS)
                })));
        }
        Ok(ValidatorOutcome::passed(format!("{} test files declared", tests.len()))
            .with_context(json!({ "testFiles": tests })))
    }
}

fn test_name_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"\b(?:it|test)(?:\.\w+)?\s*\(\s*['"`]([^'"`]+)['"`]"#).expect("static regex"),
            Regex::new(r"\bdef\s+(test_\w+)").expect("static regex"),
        ]
    })
}

/// Names of the test cases defined in `content`.
pub(crate) fn test_names(content: &str) -> Vec<String> {
    test_name_patterns()
        .iter()
        .flat_map(|re| re.captures_iter(content).map(|c| c[1].to_string()))
        .collect()
}

fn mentions_any(name: &str, keywords: &[String]) -> bool {
    let name = name.to_lowercase();
    keywords.iter().any(|k| name.contains(&k.to_lowercase()))
}

/// Every declared test file covers a success and a failure scenario.
pub struct TestHappyAndSadPath;

impl Validator for TestHappyAndSadPath {
    fn code(&self) -> &'static str {
        "TEST_HAPPY_AND_SAD_PATH"
    }

    fn gate(&self) -> Gate {
        Gate::Contract
    }

    fn description(&self) -> &'static str {
        "Declared tests cover both happy and sad paths"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let happy = ctx
            .config()
            .list(keys::TEST_HAPPY_PATH_KEYWORDS, defaults::TEST_HAPPY_PATH_KEYWORDS);
        let sad = ctx
            .config()
            .list(keys::TEST_SAD_PATH_KEYWORDS, defaults::TEST_SAD_PATH_KEYWORDS);

        let tests = manifest_tests(ctx);
        if tests.is_empty() {
            return Ok(ValidatorOutcome::skipped("no test files declared"));
        }

        let mut problems = Vec::new();
        let mut per_file = serde_json::Map::new();

        for path in &tests {
            let content = match ctx.read_file(path) {
                Ok(content) => content,
                Err(_) => {
                    problems.push(format!("{}: not present in the sandbox", path));
                    continue;
                }
            };

            let names = test_names(&content);
            if names.is_empty() {
                problems.push(format!("{}: no test cases found", path));
                continue;
            }

            let has_happy = names.iter().any(|n| mentions_any(n, &happy));
            let has_sad = names.iter().any(|n| mentions_any(n, &sad));
            if !has_happy {
                problems.push(format!("{}: no happy-path test", path));
            }
            if !has_sad {
                problems.push(format!("{}: no sad-path test", path));
            }
            per_file.insert(
                path.clone(),
                json!({ "tests": names.len(), "happy": has_happy, "sad": has_sad }),
            );
        }

        let context = json!({ "files": per_file, "happyKeywords": happy, "sadKeywords": sad });
        if problems.is_empty() {
            Ok(ValidatorOutcome::passed("every test file covers happy and sad paths")
                .with_context(context))
        } else {
            Ok(ValidatorOutcome::failed("test coverage of happy and sad paths is incomplete")
                .with_details(problems)
                .with_context(context))
        }
    }
}

/// Every import in declared source files resolves to something real.
pub struct ImportRealityCheck;

impl ImportRealityCheck {
    fn declared_packages(ctx: &ValidationContext) -> BTreeSet<String> {
        let mut packages = BTreeSet::new();
        if let Some(package) = ctx.package_json() {
            for section in [
                "dependencies",
                "devDependencies",
                "peerDependencies",
                "optionalDependencies",
            ] {
                if let Some(Value::Object(deps)) = package.get(section) {
                    packages.extend(deps.keys().cloned());
                }
            }
        }
        packages
    }

    fn python_requirements(ctx: &ValidationContext) -> String {
        ["requirements.txt", "pyproject.toml", "setup.cfg"]
            .iter()
            .filter_map(|f| ctx.read_file(f).ok())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase()
    }
}

impl Validator for ImportRealityCheck {
    fn code(&self) -> &'static str {
        "IMPORT_REALITY_CHECK"
    }

    fn gate(&self) -> Gate {
        Gate::Contract
    }

    fn description(&self) -> &'static str {
        "Imports in declared files resolve to files, packages or builtins"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let resolver = ctx.import_resolver();
        let declared = Self::declared_packages(ctx);
        let requirements = Self::python_requirements(ctx);
        let created: BTreeSet<String> = ctx
            .run()
            .manifest
            .iter()
            .filter(|e| e.action != FileAction::Delete)
            .map(|e| normalize_path(&e.path))
            .collect();

        let mut unresolved = Vec::new();
        let mut checked = 0usize;

        for path in &created {
            let Some(kind) = SourceKind::from_path(path) else {
                continue;
            };
            if !ctx.file_exists(path) {
                continue;
            }

            for import in ctx.imports(path)? {
                checked += 1;
                let found = match resolver.classify(kind, path, &import.specifier) {
                    ImportTarget::Builtin(_) => true,
                    ImportTarget::Escapes => false,
                    ImportTarget::Local(target) => {
                        let candidates = match kind {
                            SourceKind::Script => script_candidates(&target),
                            SourceKind::Python => python_candidates(&target),
                        };
                        candidates
                            .iter()
                            .any(|c| created.contains(c) || ctx.file_exists(c))
                    }
                    ImportTarget::Package(name) => match kind {
                        SourceKind::Script => {
                            declared.contains(&name)
                                || ctx.file_exists(&format!("{}/{}", ctx.dependency_dir(), name))
                        }
                        SourceKind::Python => {
                            requirements.contains(&name.to_lowercase())
                                || python_candidates(&name)
                                    .iter()
                                    .any(|c| created.contains(c) || ctx.file_exists(c))
                        }
                    },
                };

                if !found {
                    unresolved.push(format!("{}:{} imports '{}'", path, import.line, import.specifier));
                }
            }
        }

        let context = json!({ "importsChecked": checked, "declaredPackages": declared });
        if unresolved.is_empty() {
            Ok(ValidatorOutcome::passed(format!("{} imports resolved", checked)).with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} imports do not resolve", unresolved.len()))
                .with_details(unresolved)
                .with_context(context))
        }
    }
}

/// Classifies declared tests as unit, integration, e2e, ...
pub struct TestTypeDetection;

impl Validator for TestTypeDetection {
    fn code(&self) -> &'static str {
        "TEST_TYPE_DETECTION"
    }

    fn gate(&self) -> Gate {
        Gate::Contract
    }

    fn is_hard_block(&self) -> bool {
        false
    }

    fn description(&self) -> &'static str {
        "Declared tests have a recognizable type"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let patterns: Vec<(String, Regex)> = ctx
            .config()
            .map(keys::TEST_TYPE_PATTERNS, defaults::TEST_TYPE_PATTERNS)
            .into_iter()
            .filter_map(|(name, pattern)| match Regex::new(&pattern) {
                Ok(re) => Some((name, re)),
                Err(e) => {
                    warn!(test_type = %name, error = %e, "ignoring invalid test type pattern");
                    None
                }
            })
            .collect();

        let tests = manifest_tests(ctx);
        if tests.is_empty() {
            return Ok(ValidatorOutcome::skipped("no test files declared"));
        }

        let mut detected: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut unknown = Vec::new();

        for path in &tests {
            let haystack = format!("{}\n{}", path, ctx.read_file(path).unwrap_or_default());
            let types: Vec<String> = patterns
                .iter()
                .filter(|(_, re)| re.is_match(&haystack))
                .map(|(name, _)| name.clone())
                .collect();
            if types.is_empty() {
                unknown.push(format!("{}: type not recognized", path));
            }
            detected.insert(path.clone(), types);
        }

        let context = json!({ "detected": detected });
        if unknown.is_empty() {
            Ok(ValidatorOutcome::passed("test types detected").with_context(context))
        } else {
            Ok(ValidatorOutcome::warning(format!("{} test files of unknown type", unknown.len()))
                .with_details(unknown)
                .with_context(context))
        }
    }
}
