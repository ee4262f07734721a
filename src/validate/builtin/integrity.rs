//! Gate 3: compile, lint and build the sandbox.

use super::super::context::ValidationContext;
use super::super::imports::SourceKind;
use super::super::types::{Validator, ValidatorOutcome};
use super::{missing_tool, package_script, run_tool, tool_verdict};
use crate::config::{defaults, keys};
use crate::diff::ChangeKind;
use crate::run::Gate;
use anyhow::Result;
use serde_json::json;

pub struct CompilationCheck;

impl CompilationCheck {
    fn command(ctx: &ValidationContext) -> Option<String> {
        let configured = ctx.config().string(keys::COMPILE_COMMAND, "");
        if !configured.is_empty() {
            return Some(configured);
        }
        ctx.file_exists("tsconfig.json")
            .then(|| "npx tsc --noEmit".to_string())
    }
}

impl Validator for CompilationCheck {
    fn code(&self) -> &'static str {
        "COMPILATION_CHECK"
    }

    fn gate(&self) -> Gate {
        Gate::Integrity
    }

    fn mutates_worktree(&self) -> bool {
        true
    }

    fn description(&self) -> &'static str {
        "The project type-checks"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let Some(command) = Self::command(ctx) else {
            let skip = ctx.config().flag(keys::COMPILATION_SKIP_IF_NO_CONFIG, true);
            return Ok(missing_tool(
                skip,
                "no compile command configured and no tsconfig.json",
                keys::COMPILATION_SKIP_IF_NO_CONFIG,
            ));
        };
        let timeout = ctx
            .config()
            .duration_ms(keys::COMPILATION_TIMEOUT_MS, defaults::COMPILATION_TIMEOUT_MS);
        Ok(run_tool(ctx, "compilation", &command, timeout))
    }
}

/// Lints the changed source files.
pub struct LintCheck;

impl LintCheck {
    /// First lint configuration file present at the sandbox root.
    fn config_file(ctx: &ValidationContext) -> Option<String> {
        ctx.config()
            .list(keys::LINT_CONFIG_FILES, defaults::LINT_CONFIG_FILES)
            .into_iter()
            .find(|f| ctx.file_exists(f))
    }

    /// Default linter for a detected configuration file.
    fn default_command(config_file: &str) -> Option<&'static str> {
        match config_file {
            f if f.starts_with(".eslintrc") || f.starts_with("eslint.config") => Some("npx eslint"),
            "biome.json" => Some("npx @biomejs/biome lint"),
            "ruff.toml" => Some("ruff check"),
            ".flake8" => Some("flake8"),
            _ => None,
        }
    }

    fn changed_sources(ctx: &ValidationContext) -> Result<Vec<String>> {
        Ok(ctx
            .changes()?
            .iter()
            .filter(|c| !matches!(c.kind, ChangeKind::Deleted))
            .filter(|c| SourceKind::from_path(&c.path).is_some())
            .map(|c| c.path.clone())
            .collect())
    }
}

impl Validator for LintCheck {
    fn code(&self) -> &'static str {
        "LINT_CHECK"
    }

    fn gate(&self) -> Gate {
        Gate::Integrity
    }

    fn description(&self) -> &'static str {
        "Changed source files pass the linter"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let config_file = Self::config_file(ctx);
        let configured = ctx.config().string(keys::LINT_COMMAND, "");

        let command = if !configured.is_empty() {
            configured
        } else if let Some(command) = config_file.as_deref().and_then(Self::default_command) {
            command.to_string()
        } else {
            let skip = ctx.config().flag(keys::LINT_SKIP_IF_NO_CONFIG, true);
            return Ok(missing_tool(
                skip,
                "no lint command configured and no supported lint config found",
                keys::LINT_SKIP_IF_NO_CONFIG,
            ));
        };

        let files = Self::changed_sources(ctx)?;
        if files.is_empty() {
            return Ok(ValidatorOutcome::skipped("no changed source files to lint"));
        }

        let timeout = ctx
            .config()
            .duration_ms(keys::LINT_TIMEOUT_MS, defaults::LINT_TIMEOUT_MS);
        let context = json!({
            "command": command,
            "configFile": config_file,
            "files": files,
            "timeoutMs": timeout.as_millis() as u64,
        });

        match ctx.lint(&command, &files, timeout) {
            Ok(output) => Ok(tool_verdict("lint", &output, timeout.as_millis() as u64, context)),
            Err(e) => Ok(ValidatorOutcome::failed(format!("lint could not be started: {:#}", e))
                .with_context(context)),
        }
    }
}

pub struct BuildCheck;

impl BuildCheck {
    fn command(ctx: &ValidationContext) -> Option<String> {
        let configured = ctx.config().string(keys::BUILD_COMMAND, "");
        if !configured.is_empty() {
            return Some(configured);
        }
        package_script(ctx, "build").map(|_| "npm run build".to_string())
    }
}

impl Validator for BuildCheck {
    fn code(&self) -> &'static str {
        "BUILD_CHECK"
    }

    fn gate(&self) -> Gate {
        Gate::Integrity
    }

    fn mutates_worktree(&self) -> bool {
        true
    }

    fn description(&self) -> &'static str {
        "The project builds"
    }

    fn execute(&self, ctx: &ValidationContext) -> Result<ValidatorOutcome> {
        let Some(command) = Self::command(ctx) else {
            let skip = ctx.config().flag(keys::BUILD_SKIP_IF_NO_SCRIPT, true);
            return Ok(missing_tool(
                skip,
                "no build command configured and no build script",
                keys::BUILD_SKIP_IF_NO_SCRIPT,
            ));
        };
        let timeout = ctx
            .config()
            .duration_ms(keys::BUILD_TIMEOUT_MS, defaults::BUILD_TIMEOUT_MS);
        Ok(run_tool(ctx, "build", &command, timeout))
    }
}
