//! Operator actions on runs: bypass, abort and file upload.

use super::execution::write_into_sandbox;
use super::service::GateOrchestrator;
use crate::artifacts::{UPLOADS_PREFIX, check_sandbox_path};
use crate::error::{GateError, Result, codes};
use crate::events::kinds;
use crate::locks::owner_string;
use crate::run::{BypassRecord, Run, RunStatus, ValidatorStatus};
use chrono::Utc;
use serde_json::json;
use std::sync::PoisonError;
use tracing::info;

impl GateOrchestrator {
    /// Bypass one FAILED hard-blocking validator of a run.
    ///
    /// The verdict keeps its FAILED status; it is flagged `bypassed`, an
    /// audit record is appended and the gate status is recomputed. A
    /// finished run settles again, so bypassing the last blocker of a FAILED
    /// run makes it PASSED once every gate has completed. Gates the blocker
    /// kept from running are executed next, in order, and the run settles
    /// from their results.
    ///
    /// # Errors
    ///
    /// * `VALIDATOR_RESULT_NOT_FOUND` - The run has no verdict for `code`
    /// * `VALIDATOR_NOT_BYPASSABLE` - The verdict is not a hard failure, or
    ///   is already bypassed
    /// * `RUN_TERMINAL` - The run was aborted
    pub fn bypass_validator(&self, run_id: &str, code: &str, reason: Option<&str>) -> Result<Run> {
        let slot = self.slot(run_id);
        let _exec = slot.exec.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_file_lock(run_id, "bypass")?;

        let mut run = self.runs.get(run_id)?;
        if run.status == RunStatus::Aborted {
            return Err(GateError::invalid_state(
                codes::RUN_TERMINAL,
                format!("run '{}' was aborted", run_id),
            ));
        }

        let (gate_index, validator_index) = run
            .gates
            .iter()
            .enumerate()
            .find_map(|(gi, gate)| {
                gate.validators
                    .iter()
                    .position(|v| v.validator_code == code)
                    .map(|vi| (gi, vi))
            })
            .ok_or_else(|| {
                GateError::not_found(
                    codes::VALIDATOR_RESULT_NOT_FOUND,
                    format!("run '{}' has no result for validator '{}'", run_id, code),
                )
            })?;

        let verdict = &run.gates[gate_index].validators[validator_index];
        let refusal = if verdict.bypassed {
            Some("it is already bypassed".to_string())
        } else if verdict.status != ValidatorStatus::Failed {
            Some(format!("its status is {:?}", verdict.status))
        } else if !verdict.is_hard_block {
            Some("it is not hard-blocking".to_string())
        } else {
            None
        };
        if let Some(refusal) = refusal {
            return Err(GateError::invalid_state(
                codes::VALIDATOR_NOT_BYPASSABLE,
                format!("validator '{}' cannot be bypassed: {}", code, refusal),
            ));
        }

        let gate = &mut run.gates[gate_index];
        gate.validators[validator_index].bypassed = true;
        let prior = gate.status;
        gate.recompute(Some(prior));
        let gate_number = gate.gate_number;
        let gate_status = gate.status;

        let record = BypassRecord {
            validator_code: code.to_string(),
            gate_number,
            actor: owner_string(),
            reason: reason.map(str::trim).filter(|r| !r.is_empty()).map(String::from),
            at: Utc::now(),
        };
        run.bypasses.push(record.clone());
        if matches!(run.status, RunStatus::Passed | RunStatus::Failed) {
            run.status = run.settled_status();
        }

        self.persist(&mut run)?;
        if run.status == RunStatus::Aborted {
            return Err(GateError::invalid_state(
                codes::RUN_TERMINAL,
                format!("run '{}' was aborted", run_id),
            ));
        }

        self.emit(
            run_id,
            kinds::VALIDATOR_BYPASSED,
            json!({
                "validatorCode": record.validator_code,
                "gateNumber": record.gate_number,
                "actor": record.actor,
                "reason": record.reason,
                "gateStatus": gate_status,
                "runStatus": run.status,
            }),
        );
        info!(
            run_id,
            validator = code,
            actor = %record.actor,
            run_status = %run.status,
            "validator bypassed"
        );

        self.continue_after_bypass(&mut run, &slot)?;
        Ok(run)
    }

    /// Abort a run that has not finished.
    ///
    /// Idempotent: aborting an ABORTED run returns it unchanged. In-flight
    /// validator processes are killed through the run's cancel token and the
    /// sandbox is released. Does not wait for the executing thread.
    ///
    /// # Errors
    ///
    /// * `RUN_TERMINAL` - The run already PASSED or FAILED
    pub fn abort_run(&self, run_id: &str) -> Result<Run> {
        let slot = self.slot(run_id);

        let (run, previous) = {
            let _store = self.lock_store();
            let mut run = self.runs.get(run_id)?;
            match run.status {
                RunStatus::Aborted => return Ok(run),
                RunStatus::Passed | RunStatus::Failed => {
                    return Err(GateError::invalid_state(
                        codes::RUN_TERMINAL,
                        format!("run '{}' already finished as {}", run_id, run.status),
                    ));
                }
                RunStatus::Pending | RunStatus::Running => {}
            }
            let previous = run.status;
            run.status = RunStatus::Aborted;
            run.touch();
            self.runs.save(&run)?;
            (run, previous)
        };

        slot.cancel.cancel();
        self.emit(
            run_id,
            kinds::RUN_ABORTED,
            json!({ "status": run.status, "previousStatus": previous }),
        );
        self.teardown(&run);
        info!(run_id, previous = %previous, "run aborted");
        Ok(run)
    }

    /// Store files for a run and place them in its sandbox.
    ///
    /// Files are kept in the artifact store under the run's output id, so
    /// every later sandbox of that output gets them too. Returns the stored
    /// relative paths.
    ///
    /// # Errors
    ///
    /// * `PATH_TRAVERSAL` - A filename is absolute, escapes the sandbox or
    ///   points into the linked dependency directory; nothing is written in
    ///   that case
    pub fn upload_files(&self, run_id: &str, files: &[(String, Vec<u8>)]) -> Result<Vec<String>> {
        let run = self.runs.get(run_id)?;
        if run.status == RunStatus::Aborted {
            return Err(GateError::invalid_state(
                codes::RUN_TERMINAL,
                format!("run '{}' was aborted", run_id),
            ));
        }

        let dependency_dir = self.sandboxes.dependency_dir();
        let names = files
            .iter()
            .map(|(name, _)| check_sandbox_path(name, dependency_dir))
            .collect::<Result<Vec<_>>>()?;

        let live_sandbox = run.sandbox_path.as_deref().filter(|p| p.is_dir());
        for (name, (_, content)) in names.iter().zip(files) {
            self.artifacts
                .put(&run.output_id, &format!("{}{}", UPLOADS_PREFIX, name), content)?;
            if let Some(sandbox) = live_sandbox {
                write_into_sandbox(sandbox, dependency_dir, name, content)?;
            }
        }

        self.emit(
            run_id,
            kinds::FILES_UPLOADED,
            json!({ "files": names, "outputId": run.output_id }),
        );
        info!(run_id, count = names.len(), "files uploaded");
        Ok(names)
    }
}
