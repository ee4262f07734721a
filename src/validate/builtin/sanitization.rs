//! Gate 0: request sanitization.

use super::super::context::ValidationContext;
use super::super::globs::PathMatcher;
use super::super::imports::join_normalized;
use super::super::types::{Validator, ValidatorOutcome};
use crate::config::{defaults, keys};
use crate::diff::normalize_path;
use crate::run::{FileAction, Gate};
use anyhow::Result;
use serde_json::json;
use std::collections::HashSet;

pub struct TaskPromptPresent;

impl Validator for TaskPromptPresent {
    fn code(&self) -> &'static str {
        "TASK_PROMPT_PRESENT"
    }

    fn gate(&self) -> Gate {
        Gate::Sanitization
    }

    fn description(&self) -> &'static str {
        "The run carries a non-empty task description"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let prompt = ctx.run().task_prompt.trim();
        if prompt.is_empty() {
            return Ok(ValidatorOutcome::failed("task prompt is empty"));
        }
        Ok(ValidatorOutcome::passed("task prompt present")
            .with_context(json!({ "length": prompt.chars().count() })))
    }
}

/// Manifest is non-empty, relative, free of `..` and duplicates.
pub struct ManifestValid;

impl Validator for ManifestValid {
    fn code(&self) -> &'static str {
        "MANIFEST_VALID"
    }

    fn gate(&self) -> Gate {
        Gate::Sanitization
    }

    fn description(&self) -> &'static str {
        "The file manifest is well-formed"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let manifest = &ctx.run().manifest;
        if manifest.is_empty() {
            return Ok(ValidatorOutcome::failed("manifest declares no files"));
        }

        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for entry in manifest {
            let path = normalize_path(entry.path.trim());
            if path.is_empty() {
                problems.push("empty path".to_string());
                continue;
            }
            if is_absolute(&path) {
                problems.push(format!("{}: absolute path", entry.path));
                continue;
            }
            if path.split('/').any(|part| part == "..") {
                problems.push(format!("{}: contains '..'", entry.path));
                continue;
            }
            let canonical = join_normalized("", &path).unwrap_or(path);
            if !seen.insert(canonical.clone()) {
                problems.push(format!("{}: declared more than once", canonical));
            }
        }

        let context = json!({ "entries": manifest.len() });
        if problems.is_empty() {
            Ok(ValidatorOutcome::passed(format!("{} manifest entries", manifest.len()))
                .with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} invalid manifest entries", problems.len()))
                .with_details(problems)
                .with_context(context))
        }
    }
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/') || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// MODIFY/DELETE targets exist at the base ref, CREATE targets do not.
pub struct ManifestPathsConsistent;

impl Validator for ManifestPathsConsistent {
    fn code(&self) -> &'static str {
        "MANIFEST_PATHS_CONSISTENT"
    }

    fn gate(&self) -> Gate {
        Gate::Sanitization
    }

    fn description(&self) -> &'static str {
        "Manifest actions agree with the base ref"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let mut problems = Vec::new();

        for entry in &ctx.run().manifest {
            let path = normalize_path(&entry.path);
            let exists = ctx.exists_at_base(&path);
            match (entry.action, exists) {
                (FileAction::Create, true) => {
                    problems.push(format!("{}: CREATE but already exists at {}", path, ctx.run().base_ref));
                }
                (FileAction::Modify | FileAction::Delete, false) => {
                    problems.push(format!(
                        "{}: {} but missing at {}",
                        path,
                        entry.action,
                        ctx.run().base_ref
                    ));
                }
                _ => {}
            }
        }

        let context = json!({ "baseRef": ctx.run().base_ref });
        if problems.is_empty() {
            Ok(ValidatorOutcome::passed("manifest actions match the base ref").with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} manifest entries disagree with the base ref", problems.len()))
                .with_details(problems)
                .with_context(context))
        }
    }
}

pub struct SensitiveFiles;

impl Validator for SensitiveFiles {
    fn code(&self) -> &'static str {
        "SENSITIVE_FILES"
    }

    fn gate(&self) -> Gate {
        Gate::Sanitization
    }

    fn description(&self) -> &'static str {
        "The manifest does not touch secrets or repository internals"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let patterns = ctx
            .config()
            .list(keys::SENSITIVE_FILE_PATTERNS, defaults::SENSITIVE_FILE_PATTERNS);
        let matcher = PathMatcher::new(&patterns);

        let hits: Vec<String> = ctx
            .run()
            .manifest
            .iter()
            .filter_map(|entry| {
                matcher
                    .matched_pattern(&entry.path)
                    .map(|pattern| format!("{} (matches {})", entry.path, pattern))
            })
            .collect();

        let context = json!({ "patterns": patterns });
        if hits.is_empty() {
            Ok(ValidatorOutcome::passed("no sensitive files declared").with_context(context))
        } else {
            Ok(ValidatorOutcome::failed(format!("{} sensitive files declared", hits.len()))
                .with_details(hits)
                .with_context(context))
        }
    }
}
