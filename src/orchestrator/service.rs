//! Orchestrator construction, submission and queries.

use crate::artifacts::{ArtifactStore, check_output_id};
use crate::config::{ConfigStore, defaults, keys};
use crate::context::GateContext;
use crate::error::{GateError, Result, codes};
use crate::events::EventBroadcaster;
use crate::locks::RunLock;
use crate::process::CancelToken;
use crate::run::{
    FileRunRepository, Gate, Run, RunRepository, RunRequest, RunStatus, RunType,
};
use crate::sandbox::{PlatformLinker, SandboxManager};
use crate::validate::ValidatorRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Serialization point and cancel token of one run.
#[derive(Debug, Default)]
pub(super) struct RunSlot {
    pub(super) exec: Mutex<()>,
    pub(super) cancel: CancelToken,
}

/// Drives runs through their gates.
pub struct GateOrchestrator {
    pub(super) ctx: GateContext,
    pub(super) runs: Arc<dyn RunRepository>,
    pub(super) events: Arc<EventBroadcaster>,
    pub(super) config: Arc<ConfigStore>,
    pub(super) registry: ValidatorRegistry,
    pub(super) sandboxes: SandboxManager,
    pub(super) artifacts: ArtifactStore,
    slots: Mutex<HashMap<String, Arc<RunSlot>>>,
    /// Guards read-modify-write of run records against a concurrent abort.
    pub(super) store_lock: Mutex<()>,
}

impl std::fmt::Debug for GateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateOrchestrator")
            .field("state_dir", &self.ctx.state_dir)
            .field("registry", &self.registry)
            .field("sandboxes", &self.sandboxes)
            .finish_non_exhaustive()
    }
}

impl GateOrchestrator {
    /// Assemble an orchestrator from its collaborators.
    ///
    /// Uses the built-in validators and a platform sandbox manager linking
    /// the configured dependency directory.
    pub fn new(
        ctx: GateContext,
        runs: Arc<dyn RunRepository>,
        events: Arc<EventBroadcaster>,
        config: Arc<ConfigStore>,
    ) -> Self {
        let dependency_dir = config
            .snapshot()
            .string(keys::SANDBOX_DEPENDENCY_DIR, defaults::SANDBOX_DEPENDENCY_DIR);
        let artifacts = ArtifactStore::new(ctx.artifacts_dir.clone());
        Self {
            ctx,
            runs,
            events,
            config,
            registry: ValidatorRegistry::with_builtins(),
            sandboxes: SandboxManager::new(Box::new(PlatformLinker), &dependency_dir),
            artifacts,
            slots: Mutex::new(HashMap::new()),
            store_lock: Mutex::new(()),
        }
    }

    /// Orchestrator over the persisted state of `ctx`.
    pub fn open(ctx: GateContext) -> Result<Self> {
        let config = ConfigStore::open(ctx.config_path())?;
        let retention = config
            .snapshot()
            .number(keys::EVENT_RETENTION, defaults::EVENT_RETENTION) as usize;
        let runs = FileRunRepository::new(ctx.runs_dir.clone());
        let events = EventBroadcaster::open(ctx.events_dir.clone(), retention);
        Ok(Self::new(
            ctx,
            Arc::new(runs),
            Arc::new(events),
            Arc::new(config),
        ))
    }

    pub fn with_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn context(&self) -> &GateContext {
        &self.ctx
    }

    pub fn events(&self) -> &Arc<EventBroadcaster> {
        &self.events
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Validate and persist a new PENDING run.
    ///
    /// Execution runs must reference a contract run that is eligible for
    /// execution (see [`Self::can_start_execution`]).
    ///
    /// # Errors
    ///
    /// * `PATH_TRAVERSAL` - The output id is not a safe directory name
    /// * `MISSING_CONTRACT_RUN` - Execution run without a contract run id
    /// * `CONTRACT_RUN_NOT_FOUND` - The referenced contract run does not exist
    /// * `EXECUTION_NOT_ALLOWED` - The contract run has not cleared gates 0 and 1
    pub fn submit_run(&self, request: RunRequest) -> Result<Run> {
        check_output_id(&request.output_id)?;
        if request.base_ref.trim().is_empty() || request.target_ref.trim().is_empty() {
            return Err(GateError::invalid_request(
                codes::USER_ERROR,
                "base and target refs must not be empty",
            ));
        }

        match (request.run_type, request.contract_run_id.as_deref()) {
            (RunType::Execution, None) => {
                return Err(GateError::invalid_request(
                    codes::MISSING_CONTRACT_RUN,
                    "execution runs require a contract run id",
                ));
            }
            (RunType::Execution, Some(contract_id)) => {
                if self.runs.load(contract_id)?.is_none() {
                    return Err(GateError::not_found(
                        codes::CONTRACT_RUN_NOT_FOUND,
                        format!("contract run '{}' not found", contract_id),
                    ));
                }
                if !self.can_start_execution(contract_id)? {
                    return Err(GateError::invalid_state(
                        codes::EXECUTION_NOT_ALLOWED,
                        format!(
                            "contract run '{}' has not passed sanitization and contract validation",
                            contract_id
                        ),
                    ));
                }
            }
            (RunType::Contract, Some(_)) => {
                return Err(GateError::invalid_request(
                    codes::USER_ERROR,
                    "contract runs cannot reference a contract run",
                ));
            }
            (RunType::Contract, None) => {}
        }

        let run = Run::new(request);
        self.runs.save(&run)?;
        info!(
            run_id = %run.id,
            output_id = %run.output_id,
            run_type = ?run.run_type,
            "run submitted"
        );
        Ok(run)
    }

    /// Whether execution may start from `contract_run_id`.
    ///
    /// True for a contract run whose sanitization and contract gates both
    /// completed without blocking (PASSED or WARNING).
    pub fn can_start_execution(&self, contract_run_id: &str) -> Result<bool> {
        let run = self.runs.get(contract_run_id)?;
        Ok(run.run_type == RunType::Contract
            && run.status != RunStatus::Aborted
            && run.error.is_none()
            && [Gate::Sanitization, Gate::Contract]
                .iter()
                .all(|gate| run.gate_status(*gate).is_non_blocking()))
    }

    pub fn get_run(&self, run_id: &str) -> Result<Run> {
        self.runs.get(run_id)
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<Run>> {
        self.runs.list()
    }

    pub(super) fn slot(&self, run_id: &str) -> Arc<RunSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(run_id.to_string()).or_default())
    }

    pub(super) fn lock_store(&self) -> MutexGuard<'_, ()> {
        self.store_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the run's lock file, clearing one abandoned by a dead process.
    pub(super) fn acquire_file_lock(&self, run_id: &str, operation: &str) -> Result<RunLock> {
        let stale_minutes = self
            .config
            .snapshot()
            .number(keys::LOCK_STALE_MINUTES, defaults::LOCK_STALE_MINUTES);
        RunLock::clear_stale(
            &self.ctx,
            run_id,
            Duration::from_secs(stale_minutes.saturating_mul(60)),
        );
        RunLock::acquire(&self.ctx, run_id, operation)
    }

    /// Persist `run` unless it was aborted behind our back.
    ///
    /// When the stored record is ABORTED the in-memory run adopts that status
    /// and nothing is written; callers check `run.status` afterwards.
    pub(super) fn persist(&self, run: &mut Run) -> Result<()> {
        let _store = self.lock_store();
        if run.status != RunStatus::Aborted
            && let Some(stored) = self.runs.load(&run.id)?
            && stored.status == RunStatus::Aborted
        {
            run.status = RunStatus::Aborted;
            run.updated_at = stored.updated_at;
            return Ok(());
        }
        run.touch();
        self.runs.save(run)
    }

    /// Publish an event. A failed publish is logged, not fatal.
    pub(super) fn emit(&self, run_id: &str, event_type: &str, payload: Value) {
        if let Err(e) = self.events.publish(run_id, event_type, payload) {
            warn!(run_id, event_type, error = %e, "failed to publish event");
        }
    }
}
