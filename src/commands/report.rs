//! Human-readable and JSON rendering of runs.

use crate::error::{GateError, Result, codes};
use crate::exit_codes;
use crate::run::{GateResult, Run, RunStatus, ValidatorResult, ValidatorStatus};
use serde::Serialize;

const RULE: &str =
    "================================================================================";

/// Exit code a finished command reports for `run`.
pub fn run_exit_code(run: &Run) -> i32 {
    match run.status {
        RunStatus::Failed
            if run
                .error
                .as_ref()
                .is_some_and(|e| e.code == codes::SANDBOX_CREATE_FAILED) =>
        {
            exit_codes::SANDBOX_FAILURE
        }
        RunStatus::Failed => exit_codes::VALIDATION_FAILURE,
        RunStatus::Aborted => exit_codes::USER_ERROR,
        RunStatus::Pending | RunStatus::Running | RunStatus::Passed => exit_codes::SUCCESS,
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| GateError::IoError(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Print a run in full, or as JSON.
pub fn print_run(run: &Run, json: bool) -> Result<()> {
    if json {
        return print_json(run);
    }
    print!("{}", render_run(run));
    Ok(())
}

pub fn render_run(run: &Run) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("{} [{}]\n", run.id, run.status));
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Output:     {}\n", run.output_id));
    out.push_str(&format!("Type:       {:?}\n", run.run_type));
    out.push_str(&format!("Refs:       {}..{}\n", run.base_ref, run.target_ref));
    if let Some(contract) = &run.contract_run_id {
        out.push_str(&format!("Contract:   {}\n", contract));
    }
    out.push_str(&format!(
        "Created:    {}\n",
        run.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(sandbox) = &run.sandbox_path {
        out.push_str(&format!("Sandbox:    {}\n", sandbox.display()));
    }
    if let Some(error) = &run.error {
        out.push_str(&format!("Error:      [{}] {}\n", error.code, error.message));
    }

    if !run.manifest.is_empty() {
        out.push_str("\nManifest:\n");
        for entry in &run.manifest {
            out.push_str(&format!("  {:<7} {}\n", entry.action, entry.path));
        }
    }

    for gate in &run.gates {
        out.push('\n');
        out.push_str(&render_gate(gate));
    }

    if !run.bypasses.is_empty() {
        out.push_str("\nBypasses:\n");
        for bypass in &run.bypasses {
            out.push_str(&format!(
                "  {} (gate {}) by {} at {}",
                bypass.validator_code,
                bypass.gate_number,
                bypass.actor,
                bypass.at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            if let Some(reason) = &bypass.reason {
                out.push_str(&format!(": {}", reason));
            }
            out.push('\n');
        }
    }
    out
}

fn render_gate(gate: &GateResult) -> String {
    let mut out = format!(
        "Gate {} {} [{:?}]  passed {} / failed {} / warnings {} / skipped {}",
        gate.gate_number,
        gate.gate_name,
        gate.status,
        gate.passed_count,
        gate.failed_count,
        gate.warning_count,
        gate.skipped_count
    );
    if gate.bypassed_count > 0 {
        out.push_str(&format!(" / bypassed {}", gate.bypassed_count));
    }
    out.push('\n');
    for validator in &gate.validators {
        out.push_str(&render_validator(validator));
    }
    out
}

fn render_validator(v: &ValidatorResult) -> String {
    let marker = match (v.status, v.bypassed) {
        (_, true) => "BYPASSED",
        (ValidatorStatus::Passed, _) => "ok",
        (ValidatorStatus::Failed, _) if v.is_hard_block => "FAIL",
        (ValidatorStatus::Failed, _) => "fail",
        (ValidatorStatus::Warning, _) => "warn",
        (ValidatorStatus::Skipped, _) => "skip",
    };
    let mut out = format!(
        "  {:<8} {:<28} {} ({}ms)\n",
        marker, v.validator_code, v.message, v.duration_ms
    );
    for detail in v.details.iter().take(10) {
        out.push_str(&format!("           - {}\n", detail));
    }
    if v.details.len() > 10 {
        out.push_str(&format!("           … {} more\n", v.details.len() - 10));
    }
    out
}

/// One line per run, for `list`.
pub fn render_summary(run: &Run) -> String {
    let gates: Vec<String> = run
        .gates
        .iter()
        .map(|g| format!("{}:{:?}", g.gate_number, g.status))
        .collect();
    format!(
        "{}  {:<8} {:<9} {:<20} {}",
        run.id,
        run.status.to_string(),
        format!("{:?}", run.run_type).to_uppercase(),
        run.output_id,
        gates.join(" ")
    )
}

/// `CODE: message` lines for every validator still blocking `run`.
pub fn blocking_feedback(run: &Run) -> Vec<String> {
    run.gates
        .iter()
        .flat_map(|g| g.validators.iter())
        .filter(|v| v.is_blocking())
        .map(|v| {
            let mut line = format!("{}: {}", v.validator_code, v.message);
            for detail in v.details.iter().take(20) {
                line.push_str(&format!("\n  - {}", detail));
            }
            line
        })
        .collect()
}
