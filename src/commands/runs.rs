//! Run commands: submit, show, list, gate, rerun, bypass, abort, files.

use super::report::{print_json, print_run, render_summary, run_exit_code};
use crate::cli::{BypassArgs, FilesArgs, GateArgs, ListArgs, RunIdArgs, ShowArgs, SubmitArgs};
use crate::context::GateContext;
use crate::error::{GateError, Result};
use crate::exit_codes;
use crate::orchestrator::GateOrchestrator;
use crate::run::{RunRequest, parse_manifest};
use std::path::{Path, PathBuf};

/// Orchestrator over an initialized state directory.
pub(super) fn open_orchestrator(ctx: &GateContext) -> Result<GateOrchestrator> {
    ctx.ensure_initialized()?;
    GateOrchestrator::open(ctx.clone())
}

/// Absolute project directory; relative paths are taken from the cwd.
pub(super) fn resolve_project(ctx: &GateContext, project: Option<PathBuf>) -> Result<PathBuf> {
    match project {
        None => Ok(ctx.repo_root.clone()),
        Some(path) if path.is_absolute() => Ok(path),
        Some(path) => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .map_err(|e| {
                GateError::UserError(format!("failed to get current working directory: {}", e))
            }),
    }
}

/// Execute the `gatekeep submit` command.
///
/// Records the run, then executes every gate of its type unless
/// `--no-execute` is given. The exit code reflects the final status.
pub fn cmd_submit(ctx: &GateContext, args: SubmitArgs) -> Result<i32> {
    let orchestrator = open_orchestrator(ctx)?;

    let request = RunRequest {
        output_id: args.output_id,
        task_prompt: args.task,
        manifest: parse_manifest(&args.manifest)?,
        run_type: args.run_type.parse()?,
        contract_run_id: args.contract_run_id,
        project_path: resolve_project(ctx, args.project)?,
        base_ref: args.base_ref,
        target_ref: args.target_ref,
    };

    let run = orchestrator.submit_run(request)?;
    if !args.json {
        println!("Submitted run {} ({})", run.id, run.output_id);
    }
    let run = if args.no_execute {
        run
    } else {
        orchestrator.execute_run(&run.id)?
    };

    print_run(&run, args.json)?;
    Ok(run_exit_code(&run))
}

pub fn cmd_show(ctx: &GateContext, args: ShowArgs) -> Result<i32> {
    let run = open_orchestrator(ctx)?.get_run(&args.run_id)?;
    print_run(&run, args.json)?;
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_list(ctx: &GateContext, args: ListArgs) -> Result<i32> {
    let runs = open_orchestrator(ctx)?.list_runs()?;
    if args.json {
        print_json(&runs)?;
    } else if runs.is_empty() {
        println!("No runs.");
    } else {
        for run in &runs {
            println!("{}", render_summary(run));
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Execute the `gatekeep gate` command.
pub fn cmd_gate(ctx: &GateContext, args: GateArgs) -> Result<i32> {
    let run = open_orchestrator(ctx)?.run_gate(&args.run_id, args.gate)?;
    print_run(&run, args.json)?;
    Ok(run_exit_code(&run))
}

/// Execute the `gatekeep rerun` command.
pub fn cmd_rerun(ctx: &GateContext, args: GateArgs) -> Result<i32> {
    let run = open_orchestrator(ctx)?.rerun_gate(&args.run_id, args.gate)?;
    print_run(&run, args.json)?;
    Ok(run_exit_code(&run))
}

/// Execute the `gatekeep bypass` command.
pub fn cmd_bypass(ctx: &GateContext, args: BypassArgs) -> Result<i32> {
    let run = open_orchestrator(ctx)?.bypass_validator(
        &args.run_id,
        &args.validator_code,
        args.reason.as_deref(),
    )?;
    println!(
        "Bypassed {} on run {}; run is now {}",
        args.validator_code, run.id, run.status
    );
    Ok(exit_codes::SUCCESS)
}

pub fn cmd_abort(ctx: &GateContext, args: RunIdArgs) -> Result<i32> {
    let run = open_orchestrator(ctx)?.abort_run(&args.run_id)?;
    println!("Run {} is {}", run.id, run.status);
    Ok(exit_codes::SUCCESS)
}

/// Execute the `gatekeep files` command.
pub fn cmd_files(ctx: &GateContext, args: FilesArgs) -> Result<i32> {
    let orchestrator = open_orchestrator(ctx)?;

    let files = args
        .files
        .iter()
        .map(|spec| read_upload(spec))
        .collect::<Result<Vec<_>>>()?;
    let stored = orchestrator.upload_files(&args.run_id, &files)?;

    println!("Uploaded {} file(s) to run {}:", stored.len(), args.run_id);
    for name in stored {
        println!("  {}", name);
    }
    Ok(exit_codes::SUCCESS)
}

/// Read `local` or `local=dest` into `(dest, content)`.
fn read_upload(spec: &str) -> Result<(String, Vec<u8>)> {
    let (local, dest) = spec.split_once('=').unwrap_or((spec, spec));
    let content = std::fs::read(Path::new(local))
        .map_err(|e| GateError::UserError(format!("failed to read '{}': {}", local, e)))?;
    Ok((dest.to_string(), content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_upload_renames_with_equals() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("sum.ts");
        std::fs::write(&local, "export {}\n").unwrap();

        let spec = format!("{}=src/sum.ts", local.display());
        let (dest, content) = read_upload(&spec).unwrap();
        assert_eq!(dest, "src/sum.ts");
        assert_eq!(content, b"export {}\n");

        let err = read_upload("/definitely/missing/file").unwrap_err();
        assert_eq!(err.code(), "USER_ERROR");
    }
}
