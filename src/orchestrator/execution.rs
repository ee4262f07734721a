//! Gate execution: execute, run one gate, rerun.

use super::service::{GateOrchestrator, RunSlot};
use crate::artifacts::check_sandbox_path;
use crate::error::{GateError, Result, codes};
use crate::events::kinds;
use crate::process::CancelToken;
use crate::run::{Gate, GateResult, GateStatus, Run, RunStatus};
use crate::sandbox::SandboxHandle;
use crate::validate;
use crate::validate::ValidationContext;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How long the abort watcher sleeps between checks of its stop flag.
const WATCH_SLICE: Duration = Duration::from_millis(50);

/// Stored status is re-read every this many slices.
const WATCH_RELOAD_SLICES: u32 = 4;

impl GateOrchestrator {
    /// Execute every gate of a PENDING (or interrupted RUNNING) run.
    ///
    /// Returns the run in its final state. A sandbox that cannot be created
    /// fails the run with `SANDBOX_CREATE_FAILED`; that is a result, not an
    /// error of this call.
    ///
    /// # Errors
    ///
    /// * `RUN_NOT_FOUND` - Unknown run id
    /// * `RUN_TERMINAL` - The run already finished
    /// * `LockError` - Another process is executing the run
    pub fn execute_run(&self, run_id: &str) -> Result<Run> {
        let slot = self.slot(run_id);
        let _exec = slot.exec.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_file_lock(run_id, "execute")?;

        let mut run = self.runs.get(run_id)?;
        if run.status.is_terminal() {
            return Err(GateError::invalid_state(
                codes::RUN_TERMINAL,
                format!("run '{}' is already {}", run_id, run.status),
            ));
        }

        self.start(&mut run, None)?;
        if run.status == RunStatus::Aborted {
            return Ok(run);
        }

        let gates = run.run_type.gates();
        self.drive(&mut run, gates, &slot)?;
        self.settle(&mut run)?;
        Ok(run)
    }

    /// Execute a single gate of a run that has not finished.
    ///
    /// The run settles once the gate blocks or every gate of its type has
    /// completed without blocking; otherwise it stays RUNNING and keeps its
    /// sandbox for the next gate.
    pub fn run_gate(&self, run_id: &str, gate_number: u8) -> Result<Run> {
        let gate = Gate::from_number(gate_number)?;
        let slot = self.slot(run_id);
        let _exec = slot.exec.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_file_lock(run_id, "run-gate")?;

        let mut run = self.runs.get(run_id)?;
        check_applicable(&run, gate)?;
        if run.status.is_terminal() {
            return Err(GateError::invalid_state(
                codes::RUN_TERMINAL,
                format!(
                    "run '{}' is already {}; use rerun to execute gate {} again",
                    run_id, run.status, gate_number
                ),
            ));
        }

        let first = run.status == RunStatus::Pending;
        if first {
            self.start(&mut run, None)?;
        }
        if run.status == RunStatus::Aborted {
            return Ok(run);
        }

        self.drive(&mut run, &[gate], &slot)?;
        if run.status == RunStatus::Running
            && (run.gate_status(gate) == GateStatus::Failed || run.all_gates_non_blocking())
        {
            self.settle(&mut run)?;
        }
        Ok(run)
    }

    /// Re-execute one gate of a finished run, replacing only that gate.
    ///
    /// Other gates, the bypass audit trail and the event history are kept.
    /// The run settles again from the combined gate results.
    ///
    /// # Errors
    ///
    /// * `RUN_NOT_RERUNNABLE` - The run is not PASSED or FAILED
    /// * `GATE_NOT_APPLICABLE` - The gate does not belong to the run's type
    pub fn rerun_gate(&self, run_id: &str, gate_number: u8) -> Result<Run> {
        let gate = Gate::from_number(gate_number)?;
        let slot = self.slot(run_id);
        let _exec = slot.exec.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_file_lock(run_id, "rerun")?;

        let mut run = self.runs.get(run_id)?;
        check_applicable(&run, gate)?;
        if !matches!(run.status, RunStatus::Passed | RunStatus::Failed) {
            return Err(GateError::invalid_state(
                codes::RUN_NOT_RERUNNABLE,
                format!(
                    "run '{}' is {}; only PASSED or FAILED runs can be rerun",
                    run_id, run.status
                ),
            ));
        }

        info!(run_id, gate = gate_number, "rerunning gate");
        run.error = None;
        self.start(&mut run, Some(gate))?;
        if run.status == RunStatus::Aborted {
            return Ok(run);
        }

        self.drive(&mut run, &[gate], &slot)?;
        self.settle(&mut run)?;
        Ok(run)
    }

    /// Run the gates a blocker kept from running, once a bypass has cleared
    /// the way.
    ///
    /// Applies to a FAILED run with no remaining blocker, no run error and
    /// gates of its type still PENDING. The caller holds the run's locks.
    /// Returns whether anything was executed.
    pub(super) fn continue_after_bypass(&self, run: &mut Run, slot: &RunSlot) -> Result<bool> {
        if run.status != RunStatus::Failed || run.error.is_some() || run.has_blocking_failure() {
            return Ok(false);
        }
        let remaining: Vec<Gate> = run
            .run_type
            .gates()
            .iter()
            .copied()
            .filter(|&gate| run.gate_status(gate) == GateStatus::Pending)
            .collect();
        if remaining.is_empty() {
            return Ok(false);
        }

        info!(run_id = %run.id, gates = remaining.len(), "continuing after bypass");
        self.start(run, None)?;
        if run.status == RunStatus::Aborted {
            return Ok(true);
        }
        self.drive(run, &remaining, slot)?;
        self.settle(run)?;
        Ok(true)
    }

    /// Mark the run RUNNING and announce it.
    fn start(&self, run: &mut Run, rerun: Option<Gate>) -> Result<()> {
        run.status = RunStatus::Running;
        self.persist(run)?;
        if run.status == RunStatus::Aborted {
            return Ok(());
        }

        let gates: Vec<u8> = run.run_type.gates().iter().map(Gate::number).collect();
        let mut payload = json!({
            "runType": run.run_type,
            "outputId": run.output_id,
            "baseRef": run.base_ref,
            "targetRef": run.target_ref,
            "gates": gates,
        });
        if let Some(gate) = rerun {
            payload["rerunGate"] = json!(gate.number());
        }
        self.emit(&run.id, kinds::RUN_STARTED, payload);
        info!(run_id = %run.id, run_type = ?run.run_type, "run started");
        Ok(())
    }

    /// Materialize the sandbox and execute `gates` in order.
    ///
    /// Stops at the first FAILED gate or when the run is aborted. Aborts
    /// issued by another process are picked up by a watcher thread that
    /// cancels the run's token.
    fn drive(&self, run: &mut Run, gates: &[Gate], slot: &RunSlot) -> Result<()> {
        let sandbox = match self.materialize(run) {
            Ok(path) => path,
            Err(message) => {
                warn!(run_id = %run.id, error = %message, "sandbox creation failed");
                run.fail_with(codes::SANDBOX_CREATE_FAILED, message);
                self.persist(run)?;
                if run.status != RunStatus::Aborted {
                    self.emit(
                        &run.id,
                        kinds::RUN_FAILED,
                        json!({ "status": run.status, "error": run.error }),
                    );
                }
                return Ok(());
            }
        };

        self.persist(run)?;
        if run.status == RunStatus::Aborted {
            // Aborted while the worktree was being created.
            self.sandboxes.cleanup(&sandbox);
            return Ok(());
        }

        let run_id = run.id.clone();
        let done = AtomicBool::new(false);
        thread::scope(|scope| {
            scope.spawn(|| self.watch_for_abort(&run_id, &slot.cancel, &done));
            let result = self.run_gates(run, gates, &sandbox, &slot.cancel);
            done.store(true, Ordering::SeqCst);
            result
        })
    }

    fn run_gates(
        &self,
        run: &mut Run,
        gates: &[Gate],
        sandbox: &Path,
        cancel: &CancelToken,
    ) -> Result<()> {
        for &gate in gates {
            if cancel.is_cancelled() || run.status == RunStatus::Aborted {
                break;
            }
            let status = self.execute_gate(run, gate, sandbox, cancel)?;
            if run.status == RunStatus::Aborted || status == GateStatus::Failed {
                break;
            }
        }
        Ok(())
    }

    /// Execute one gate and record its result on the run.
    fn execute_gate(
        &self,
        run: &mut Run,
        gate: Gate,
        sandbox: &Path,
        cancel: &CancelToken,
    ) -> Result<GateStatus> {
        let snapshot = self.config.snapshot();
        let prior = run.gate_result(gate).map(|g| g.status);

        let running = GateResult::running(gate);
        let started_at = running.started_at;
        run.put_gate(running);
        self.persist(run)?;
        if run.status == RunStatus::Aborted {
            return Ok(GateStatus::Pending);
        }
        self.emit(
            &run.id,
            kinds::GATE_STARTED,
            json!({ "gateNumber": gate.number(), "gateName": gate.name() }),
        );

        let ctx = ValidationContext::new(
            run.clone(),
            sandbox.to_path_buf(),
            snapshot,
            cancel.clone(),
        );
        let run_id = run.id.clone();
        let verdicts = validate::execute_gate(&self.registry, gate, &ctx, |verdict| {
            self.emit(&run_id, kinds::VALIDATOR_COMPLETED, json!(verdict));
        });

        let result = GateResult::completed(gate, verdicts, started_at, prior);
        let status = result.status;
        let summary = json!({
            "gateNumber": result.gate_number,
            "gateName": result.gate_name,
            "status": result.status,
            "passedCount": result.passed_count,
            "failedCount": result.failed_count,
            "warningCount": result.warning_count,
            "skippedCount": result.skipped_count,
            "bypassedCount": result.bypassed_count,
        });
        run.put_gate(result);
        self.persist(run)?;
        if run.status == RunStatus::Aborted {
            return Ok(status);
        }

        self.emit(&run.id, kinds::GATE_COMPLETED, summary);
        info!(run_id = %run.id, gate = gate.number(), status = ?status, "gate completed");
        Ok(status)
    }

    /// Settle a RUNNING run from its gate results, announce it and release
    /// the sandbox.
    pub(super) fn settle(&self, run: &mut Run) -> Result<()> {
        if run.status != RunStatus::Running {
            return Ok(());
        }

        run.status = run.settled_status();
        self.persist(run)?;
        if run.status == RunStatus::Aborted {
            return Ok(());
        }

        let blocking: Vec<&str> = run
            .gates
            .iter()
            .flat_map(|g| &g.validators)
            .filter(|v| v.is_blocking())
            .map(|v| v.validator_code.as_str())
            .collect();
        let gates: Vec<Value> = run
            .gates
            .iter()
            .map(|g| json!({ "gateNumber": g.gate_number, "status": g.status }))
            .collect();
        let event_type = if run.status == RunStatus::Passed {
            kinds::RUN_COMPLETED
        } else {
            kinds::RUN_FAILED
        };
        self.emit(
            &run.id,
            event_type,
            json!({
                "status": run.status,
                "blocking": blocking,
                "gates": gates,
            }),
        );
        info!(run_id = %run.id, status = %run.status, "run finished");

        self.teardown(run);
        Ok(())
    }

    pub(super) fn teardown(&self, run: &Run) {
        if let Some(path) = &run.sandbox_path {
            self.sandboxes.cleanup(path);
        }
    }

    /// Create the run's sandbox and overlay its uploaded files.
    fn materialize(&self, run: &mut Run) -> std::result::Result<PathBuf, String> {
        let base = self.ctx.run_sandbox_base(&run.id);
        let outcome = self
            .sandboxes
            .create(&run.project_path, &base, &run.target_ref);
        if !outcome.success {
            return Err(outcome
                .error
                .unwrap_or_else(|| "sandbox creation failed".to_string()));
        }

        let copied = match self.overlay_uploads(&run.output_id, &outcome.sandbox_path) {
            Ok(copied) => copied,
            Err(e) => {
                self.sandboxes.cleanup(&outcome.sandbox_path);
                return Err(format!("failed to copy uploaded files into the sandbox: {}", e));
            }
        };

        run.sandbox_path = Some(outcome.sandbox_path.clone());
        let handle = SandboxHandle {
            sandbox_path: outcome.sandbox_path.clone(),
            junction_created: outcome.junction_created,
            run_id: run.id.clone(),
            git_ref: run.target_ref.clone(),
            reused: outcome.reused,
            dependency_dir: self.sandboxes.dependency_dir().to_string(),
        };
        let mut payload = json!(handle);
        payload["uploadedFiles"] = json!(copied);
        self.emit(&run.id, kinds::SANDBOX_READY, payload);
        Ok(outcome.sandbox_path)
    }

    fn overlay_uploads(&self, output_id: &str, sandbox: &Path) -> Result<usize> {
        let uploads = self.artifacts.uploads(output_id)?;
        for (relative, stored) in &uploads {
            let content = fs::read(stored).map_err(|e| {
                GateError::IoError(format!("failed to read '{}': {}", stored.display(), e))
            })?;
            write_into_sandbox(sandbox, self.sandboxes.dependency_dir(), relative, &content)?;
        }
        Ok(uploads.len())
    }

    fn watch_for_abort(&self, run_id: &str, cancel: &CancelToken, done: &AtomicBool) {
        let mut slices = 0u32;
        while !done.load(Ordering::SeqCst) && !cancel.is_cancelled() {
            thread::sleep(WATCH_SLICE);
            slices += 1;
            if slices % WATCH_RELOAD_SLICES != 0 {
                continue;
            }
            if let Ok(Some(stored)) = self.runs.load(run_id)
                && stored.status == RunStatus::Aborted
            {
                info!(run_id, "run aborted elsewhere, cancelling");
                cancel.cancel();
                return;
            }
        }
    }
}

/// Write `content` at `relative` inside the sandbox, creating parents.
///
/// Paths into the linked dependency directory are refused, and so is any
/// path whose existing ancestors resolve outside the sandbox (a symlink in
/// the checked-out tree).
///
/// # Errors
///
/// * `PATH_TRAVERSAL` - The path leaves the sandbox; nothing is written
pub(super) fn write_into_sandbox(
    sandbox: &Path,
    dependency_dir: &str,
    relative: &str,
    content: &[u8],
) -> Result<()> {
    let relative = check_sandbox_path(relative, dependency_dir)?;
    let root = sandbox.canonicalize().map_err(|e| {
        GateError::IoError(format!("failed to resolve '{}': {}", sandbox.display(), e))
    })?;
    let escapes = || {
        GateError::invalid_request(
            codes::PATH_TRAVERSAL,
            format!("'{}' resolves outside the sandbox", relative),
        )
    };

    // Resolve what already exists before creating anything beneath it.
    let target = sandbox.join(&relative);
    for ancestor in target.ancestors().skip(1) {
        if ancestor == sandbox {
            break;
        }
        if let Ok(real) = ancestor.canonicalize() {
            if !real.starts_with(&root) {
                return Err(escapes());
            }
            break;
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            GateError::IoError(format!("failed to create '{}': {}", parent.display(), e))
        })?;
    }
    if fs::symlink_metadata(&target).is_ok() {
        match target.canonicalize() {
            Ok(real) if real.starts_with(&root) => {}
            _ => return Err(escapes()),
        }
    }
    fs::write(&target, content)
        .map_err(|e| GateError::IoError(format!("failed to write '{}': {}", target.display(), e)))
}

fn check_applicable(run: &Run, gate: Gate) -> Result<()> {
    if run.run_type.gates().contains(&gate) {
        return Ok(());
    }
    Err(GateError::invalid_request(
        codes::GATE_NOT_APPLICABLE,
        format!(
            "gate {} ({}) does not apply to {:?} runs",
            gate.number(),
            gate.name(),
            run.run_type
        ),
    ))
}
