//! Glob matching for configured path lists.

use crate::diff::normalize_path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

/// A compiled list of path globs.
///
/// Patterns are matched against the full repository-relative path. Patterns
/// without a `/` also match the file name alone, so `.env` catches
/// `config/.env`. `prefix/**` matches everything below `prefix/`.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    set: GlobSet,
    patterns: Vec<String>,
    basename_only: Vec<bool>,
}

impl PathMatcher {
    /// Compile `patterns`, skipping (and logging) any that are invalid.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        let mut basename_only = Vec::new();

        for pattern in patterns {
            let normalized = normalize_path(pattern.as_ref().trim());
            if normalized.is_empty() {
                continue;
            }
            match Glob::new(&normalized) {
                Ok(glob) => {
                    builder.add(glob);
                    basename_only.push(!normalized.contains('/'));
                    kept.push(normalized);
                }
                Err(e) => warn!(pattern = %normalized, error = %e, "ignoring invalid glob"),
            }
        }

        let set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to compile globs, matching nothing");
            GlobSet::empty()
        });

        Self {
            set,
            patterns: kept,
            basename_only,
        }
    }

    /// The first pattern matching `path`, if any.
    pub fn matched_pattern(&self, path: &str) -> Option<&str> {
        let path = normalize_path(path);
        if let Some(&i) = self.set.matches(&path).first() {
            return Some(&self.patterns[i]);
        }

        let name = path.rsplit('/').next().unwrap_or(&path);
        self.set
            .matches(name)
            .into_iter()
            .find(|&i| self.basename_only[i])
            .map(|i| self.patterns[i].as_str())
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matched_pattern(path).is_some()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_double_star() {
        let matcher = PathMatcher::new(&["artifacts/**"]);
        assert!(matcher.is_match("artifacts/2025/test.spec.tsx"));
        assert!(matcher.is_match("artifacts/a.ts"));
        assert!(!matcher.is_match("src/Button.spec.tsx"));
        assert!(!matcher.is_match("src/artifacts/a.ts"));
    }

    #[test]
    fn test_basename_patterns() {
        let matcher = PathMatcher::new(&[".env", "*.pem", ".env.*"]);
        assert_eq!(matcher.matched_pattern("config/.env"), Some(".env"));
        assert_eq!(matcher.matched_pattern("certs/server.pem"), Some("*.pem"));
        assert_eq!(matcher.matched_pattern(".env.local"), Some(".env.*"));
        assert!(!matcher.is_match("src/env.ts"));
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let matcher = PathMatcher::new(&["src/**/*.spec.*"]);
        assert!(matcher.is_match("src\\components\\Button.spec.tsx"));
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let matcher = PathMatcher::new(&["[", "docs/**"]);
        assert_eq!(matcher.patterns(), &["docs/**".to_string()]);
        assert!(matcher.is_match("docs/readme.md"));
    }
}
