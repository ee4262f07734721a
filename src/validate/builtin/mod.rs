//! Built-in validators, one module per gate.

mod contract;
mod execution;
mod integrity;
mod sanitization;

pub use contract::{
    ImportRealityCheck, TestFileInManifest, TestHappyAndSadPath, TestTypeDetection,
};
pub use execution::{
    DeleteDependencyCheck, DiffScopeEnforcement, StubDetection, TestExecution,
    TestReadOnlyEnforcement,
};
pub use integrity::{BuildCheck, CompilationCheck, LintCheck};
pub use sanitization::{ManifestPathsConsistent, ManifestValid, SensitiveFiles, TaskPromptPresent};

use super::context::ValidationContext;
use super::types::{Validator, ValidatorOutcome};
use crate::process::Termination;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Every built-in validator, in gate and execution order.
pub fn all() -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(TaskPromptPresent),
        Arc::new(ManifestValid),
        Arc::new(ManifestPathsConsistent),
        Arc::new(SensitiveFiles),
        Arc::new(TestFileInManifest),
        Arc::new(TestHappyAndSadPath),
        Arc::new(ImportRealityCheck),
        Arc::new(TestTypeDetection),
        Arc::new(DiffScopeEnforcement),
        Arc::new(TestReadOnlyEnforcement),
        Arc::new(DeleteDependencyCheck),
        Arc::new(StubDetection),
        Arc::new(TestExecution),
        Arc::new(CompilationCheck),
        Arc::new(LintCheck),
        Arc::new(BuildCheck),
    ]
}

/// Lines of tool output kept in a verdict.
const OUTPUT_TAIL_LINES: usize = 40;

/// Outcome when no tool command could be determined.
///
/// `skip` comes from the validator's `*_SKIP_IF_*` flag.
fn missing_tool(skip: bool, what: &str, flag: &str) -> ValidatorOutcome {
    let context = json!({ "policyFlag": flag, "skip": skip });
    if skip {
        ValidatorOutcome::skipped(format!("{}; skipped", what)).with_context(context)
    } else {
        ValidatorOutcome::failed(format!("{}; {} is false", what, flag)).with_context(context)
    }
}

/// Run a tool command and turn its exit into a verdict.
///
/// Non-zero exit, timeout and spawn failures all become FAILED.
fn run_tool(ctx: &ValidationContext, label: &str, command: &str, timeout: Duration) -> ValidatorOutcome {
    let timeout_ms = timeout.as_millis() as u64;
    let context = json!({ "command": command, "timeoutMs": timeout_ms });

    let output = match ctx.run_command(command, timeout) {
        Ok(output) => output,
        Err(e) => {
            return ValidatorOutcome::failed(format!("{} could not be started: {:#}", label, e))
                .with_context(context);
        }
    };
    tool_verdict(label, &output, timeout_ms, context)
}

fn tool_verdict(
    label: &str,
    output: &crate::process::CommandOutput,
    timeout_ms: u64,
    mut context: serde_json::Value,
) -> ValidatorOutcome {
    context["elapsedMs"] = json!(output.elapsed.as_millis() as u64);
    let tail: Vec<String> = output
        .tail(OUTPUT_TAIL_LINES)
        .lines()
        .map(str::to_string)
        .collect();

    match output.termination {
        Termination::TimedOut => {
            ValidatorOutcome::failed(format!("{} timed out after {}ms", label, timeout_ms))
                .with_details(tail)
                .with_context(context)
        }
        Termination::Cancelled => ValidatorOutcome::failed(format!("{} was cancelled", label))
            .with_context(context),
        Termination::Exited if output.status.success() => {
            ValidatorOutcome::passed(format!("{} succeeded", label)).with_context(context)
        }
        Termination::Exited => {
            context["exitCode"] = json!(output.status.code());
            ValidatorOutcome::failed(format!(
                "{} failed with exit code {}",
                label,
                output
                    .status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string())
            ))
            .with_details(tail)
            .with_context(context)
        }
    }
}

/// `scripts.<name>` from package.json, ignoring npm's placeholder test script.
fn package_script(ctx: &ValidationContext, name: &str) -> Option<String> {
    let package = ctx.package_json()?;
    let script = package.get("scripts")?.get(name)?.as_str()?.trim().to_string();
    if script.is_empty() || script.contains("no test specified") {
        None
    } else {
        Some(script)
    }
}
