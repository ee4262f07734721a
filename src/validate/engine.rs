//! Gate execution: validator fan-out and verdict capture.

use super::context::ValidationContext;
use super::registry::ValidatorRegistry;
use super::types::{Validator, ValidatorOutcome};
use crate::run::{Gate, ValidatorResult, ValidatorStatus};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Run one validator, converting errors and panics into a FAILED verdict.
pub fn execute_validator(validator: &dyn Validator, ctx: &ValidationContext) -> ValidatorResult {
    let started = Instant::now();

    let outcome = if ctx.cancel_token().is_cancelled() {
        ValidatorOutcome::skipped("run was aborted before this check started")
    } else {
        match panic::catch_unwind(AssertUnwindSafe(|| validator.execute(ctx))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(validator = validator.code(), error = %format!("{:#}", e), "validator errored");
                ValidatorOutcome::failed(format!("validator error: {:#}", e))
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(validator = validator.code(), reason = %reason, "validator panicked");
                ValidatorOutcome::failed(format!("validator panicked: {}", reason))
            }
        }
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    debug!(
        validator = validator.code(),
        status = ?outcome.status,
        duration_ms,
        "validator finished"
    );

    ValidatorResult {
        validator_code: validator.code().to_string(),
        gate_number: validator.gate().number(),
        status: outcome.status,
        is_hard_block: validator.is_hard_block(),
        bypassed: false,
        message: outcome.message,
        details: outcome.details,
        context: outcome.context,
        duration_ms,
    }
}

/// Run every validator registered for `gate`.
///
/// Read-only validators run concurrently on scoped threads; validators that
/// mutate the worktree run afterwards, one at a time. `on_result` is called
/// as each verdict lands (from worker threads for the concurrent phase).
/// The returned verdicts are in registration order.
pub fn execute_gate<F>(
    registry: &ValidatorRegistry,
    gate: Gate,
    ctx: &ValidationContext,
    on_result: F,
) -> Vec<ValidatorResult>
where
    F: Fn(&ValidatorResult) + Sync,
{
    let validators = registry.for_gate(gate);
    let mut slots: Vec<Option<ValidatorResult>> = vec![None; validators.len()];

    let (mutating, read_only): (Vec<_>, Vec<_>) = validators
        .iter()
        .enumerate()
        .partition(|(_, v)| v.mutates_worktree());

    let on_result = &on_result;
    thread::scope(|scope| {
        let handles: Vec<_> = read_only
            .iter()
            .map(|(i, validator)| {
                let validator = Arc::clone(validator);
                let handle = scope.spawn(move || {
                    let result = execute_validator(validator.as_ref(), ctx);
                    on_result(&result);
                    result
                });
                (*i, handle)
            })
            .collect();

        for (i, handle) in handles {
            slots[i] = Some(handle.join().unwrap_or_else(|payload| {
                let v = &validators[i];
                crashed(v.as_ref(), &panic_message(payload.as_ref()))
            }));
        }
    });

    for (i, validator) in mutating {
        let result = execute_validator(validator.as_ref(), ctx);
        on_result(&result);
        slots[i] = Some(result);
    }

    slots.into_iter().flatten().collect()
}

fn crashed(validator: &dyn Validator, reason: &str) -> ValidatorResult {
    ValidatorResult {
        validator_code: validator.code().to_string(),
        gate_number: validator.gate().number(),
        status: ValidatorStatus::Failed,
        is_hard_block: validator.is_hard_block(),
        bypassed: false,
        message: format!("validator thread panicked: {}", reason),
        details: Vec::new(),
        context: serde_json::Value::Null,
        duration_ms: 0,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
