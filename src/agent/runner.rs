//! Agent runs: single phases and the plan → spec → implement → fix pipeline.

use super::config::AgentsConfig;
use super::output::extract_files;
use super::phase::{
    AgentRun, AgentRunStatus, PhaseHandle, PhaseRecord, PhaseSelection, Step, events_url,
};
use super::prompt::{PromptContext, render_prompt};
use super::provider::{CommandProvider, CompletionRequest, LlmProvider};
use super::resolve::{resolve_budget, resolve_selection};
use crate::artifacts::{ArtifactStore, UPLOADS_PREFIX, check_filename, check_output_id};
use crate::config::{ConfigStore, defaults, keys};
use crate::context::GateContext;
use crate::error::{GateError, Result, codes};
use crate::events::{EventBroadcaster, kinds};
use crate::process::CancelToken;
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Artifact holding the serialized agent run.
pub const RUN_RECORD_ARTIFACT: &str = "agent-run.json";

/// Inputs shared by single phases and pipelines.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub task: String,
    pub project_path: PathBuf,
    /// Artifact namespace. Defaults to the agent run id.
    pub output_id: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub max_iterations: Option<u64>,
    /// Validation failures handed to a fix phase.
    pub feedback: Option<String>,
}

/// Runs generative phases and records what they produce.
pub struct AgentRunner {
    config: AgentsConfig,
    artifacts: ArtifactStore,
    events: Arc<EventBroadcaster>,
    /// In-process providers taking precedence over command templates.
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    runs: Mutex<HashMap<String, AgentRun>>,
    max_fix_attempts: u64,
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&String> = self.providers.keys().collect();
        providers.sort();
        f.debug_struct("AgentRunner")
            .field("artifacts", &self.artifacts)
            .field("providers", &providers)
            .field("max_fix_attempts", &self.max_fix_attempts)
            .finish_non_exhaustive()
    }
}

impl AgentRunner {
    pub fn new(config: AgentsConfig, artifacts: ArtifactStore, events: Arc<EventBroadcaster>) -> Self {
        Self {
            config,
            artifacts,
            events,
            providers: HashMap::new(),
            runs: Mutex::new(HashMap::new()),
            max_fix_attempts: defaults::AGENT_MAX_FIX_ATTEMPTS,
        }
    }

    /// Runner over the persisted state of `ctx`.
    ///
    /// Reads `agents.yaml` (absent means built-in defaults) and the fix
    /// attempt bound from the validation configuration.
    pub fn open(ctx: &GateContext, events: Arc<EventBroadcaster>, settings: &ConfigStore) -> Result<Self> {
        let config = AgentsConfig::load_or_default(ctx.agents_config_path())?;
        let max_fix_attempts = settings
            .snapshot()
            .number(keys::AGENT_MAX_FIX_ATTEMPTS, defaults::AGENT_MAX_FIX_ATTEMPTS);
        Ok(Self::new(config, ArtifactStore::new(ctx.artifacts_dir.clone()), events)
            .with_max_fix_attempts(max_fix_attempts))
    }

    /// Register an in-process provider under `name`, replacing the command
    /// template of that name.
    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn with_max_fix_attempts(mut self, attempts: u64) -> Self {
        self.max_fix_attempts = attempts;
        self
    }

    pub fn config(&self) -> &AgentsConfig {
        &self.config
    }

    /// Run one phase to completion.
    ///
    /// Provider, model and output id problems are returned before a run
    /// exists. Once the run is created, provider failures and budget
    /// exhaustion mark it FAILED and publish `agent:failed`; the handle is
    /// still returned so the caller can inspect it.
    ///
    /// # Errors
    ///
    /// * `INVALID_PROVIDER` / `INVALID_MODEL` - Resolution failed
    /// * `PATH_TRAVERSAL` - The output id is not a safe path segment
    pub fn run_single_phase(&self, step: Step, request: &AgentRequest) -> Result<PhaseHandle> {
        let selection = resolve_selection(
            step,
            request.provider.as_deref(),
            request.model.as_deref(),
            &self.config,
        )?;
        let mut run = self.create_run(step, request)?;

        self.publish(
            &run.id,
            kinds::AGENT_STARTED,
            json!({
                "outputId": run.output_id,
                "steps": [step],
                "budget": run.budget,
            }),
        );

        let mut prompt_ctx = self.prompt_context(&run, request);
        prompt_ctx.feedback = request.feedback.clone().unwrap_or_default();
        let outcome = self.execute_phase(&mut run, &selection, &prompt_ctx, &CancelToken::new());
        self.finish(&mut run, outcome.map(|_| ()));

        Ok(PhaseHandle {
            events_url: events_url(&run.id),
            run_id: run.id,
            phase: selection,
        })
    }

    /// Run plan, spec and implement, then fix until `validate` passes.
    ///
    /// `validate` returns `None` when the produced change is acceptable and
    /// the failure feedback otherwise. At most `max_fix_attempts` fix phases
    /// run; when validation still fails the run is FAILED with
    /// `FIX_ATTEMPTS_EXHAUSTED`.
    ///
    /// # Errors
    ///
    /// Same synchronous errors as [`AgentRunner::run_single_phase`], checked
    /// for every step before anything runs.
    pub fn run_pipeline<F>(&self, request: &AgentRequest, mut validate: F) -> Result<AgentRun>
    where
        F: FnMut(&AgentRun) -> Result<Option<String>>,
    {
        let selections = Step::ALL
            .into_iter()
            .map(|step| {
                resolve_selection(
                    step,
                    request.provider.as_deref(),
                    request.model.as_deref(),
                    &self.config,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let mut run = self.create_run(Step::Plan, request)?;

        self.publish(
            &run.id,
            kinds::AGENT_STARTED,
            json!({
                "outputId": run.output_id,
                "steps": Step::ALL,
                "budget": run.budget,
                "maxFixAttempts": self.max_fix_attempts,
            }),
        );

        let cancel = CancelToken::new();
        let mut prompt_ctx = self.prompt_context(&run, request);
        let outcome = (|| -> Result<()> {
            for selection in &selections[..3] {
                let text = self.execute_phase(&mut run, selection, &prompt_ctx, &cancel)?;
                match selection.step {
                    Step::Plan => prompt_ctx.plan = text,
                    Step::Spec => prompt_ctx.spec = text,
                    _ => {}
                }
            }

            let mut attempts = 0;
            while let Some(feedback) = validate(&run)? {
                if attempts >= self.max_fix_attempts {
                    return Err(GateError::invalid_state(
                        codes::FIX_ATTEMPTS_EXHAUSTED,
                        format!(
                            "validation still failing after {} fix attempt(s)",
                            attempts
                        ),
                    ));
                }
                attempts += 1;
                prompt_ctx.feedback = feedback;
                self.execute_phase(&mut run, &selections[3], &prompt_ctx, &cancel)?;
            }
            Ok(())
        })();

        self.finish(&mut run, outcome);
        Ok(run)
    }

    /// Snapshot of an agent run started by this runner.
    pub fn get(&self, run_id: &str) -> Result<AgentRun> {
        self.lock_runs().get(run_id).cloned().ok_or_else(|| {
            GateError::not_found(
                codes::AGENT_RUN_NOT_FOUND,
                format!("agent run '{}' not found", run_id),
            )
        })
    }

    fn create_run(&self, step: Step, request: &AgentRequest) -> Result<AgentRun> {
        if let Some(output_id) = request.output_id.as_deref() {
            check_output_id(output_id)?;
        }
        if request.task.trim().is_empty() {
            return Err(GateError::UserError("task description cannot be empty".to_string()));
        }

        let budget = resolve_budget(step, request.max_tokens, request.max_iterations, &self.config);
        let mut run = AgentRun::new(
            String::new(),
            request.task.clone(),
            request.project_path.clone(),
            budget,
        );
        run.output_id = request.output_id.clone().unwrap_or_else(|| run.id.clone());
        self.lock_runs().insert(run.id.clone(), run.clone());
        info!(agent_run = %run.id, output_id = %run.output_id, "agent run created");
        Ok(run)
    }

    /// Prompt values for a run. Earlier plan and spec outputs stored under
    /// the same output id carry over, so separate single-phase calls chain.
    fn prompt_context(&self, run: &AgentRun, request: &AgentRequest) -> PromptContext {
        let earlier = |step: Step| {
            self.artifacts
                .get(&run.output_id, &format!("{}.md", step))
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };
        PromptContext {
            task: request.task.clone(),
            output_id: run.output_id.clone(),
            project_path: run.project_path.display().to_string(),
            plan: earlier(Step::Plan),
            spec: earlier(Step::Spec),
            feedback: String::new(),
        }
    }

    /// Run one phase and record it. Returns the provider's text.
    fn execute_phase(
        &self,
        run: &mut AgentRun,
        selection: &PhaseSelection,
        prompt_ctx: &PromptContext,
        cancel: &CancelToken,
    ) -> Result<String> {
        let step = selection.step;
        if run.iterations >= run.budget.max_iterations {
            return Err(GateError::invalid_state(
                codes::BUDGET_EXHAUSTED,
                format!("iteration cap of {} reached", run.budget.max_iterations),
            ));
        }
        if run.tokens_left() == 0 {
            return Err(GateError::invalid_state(
                codes::BUDGET_EXHAUSTED,
                format!("token budget of {} used up", run.budget.max_tokens),
            ));
        }

        self.publish(
            &run.id,
            kinds::AGENT_PHASE_STARTED,
            json!({
                "step": step,
                "provider": selection.provider,
                "model": selection.model,
            }),
        );

        let custom = self
            .config
            .step(step)
            .and_then(|s| s.prompt_template.as_deref());
        let prompt = render_prompt(step, prompt_ctx, custom)?;
        let prompt_file = self.artifacts.put(
            &run.output_id,
            &format!("{}.prompt.md", step),
            prompt.as_bytes(),
        )?;

        let provider = self.provider(&selection.provider)?;
        let request = CompletionRequest {
            step,
            model: selection.model.clone(),
            prompt,
            prompt_file,
            max_tokens: run.tokens_left(),
            workdir: run.project_path.clone(),
        };
        run.iterations += 1;

        let completion = match provider.complete(&request, cancel) {
            Ok(completion) => completion,
            Err(e) => {
                let message = format!("{:#}", e);
                run.phases.push(PhaseRecord {
                    step,
                    provider: selection.provider.clone(),
                    model: selection.model.clone(),
                    artifact: None,
                    files: Vec::new(),
                    input_tokens: 0,
                    output_tokens: 0,
                    latency_ms: 0,
                    error: Some(message.clone()),
                });
                return Err(GateError::provider(codes::AGENT_FAILED, message));
            }
        };

        run.tokens_used += completion.input_tokens + completion.output_tokens;

        let artifact = self.phase_artifact_name(run, step);
        self.artifacts
            .put(&run.output_id, &artifact, completion.text.as_bytes())?;
        self.publish_artifact(run, &artifact, completion.text.len());

        let mut files = Vec::new();
        for (path, content) in extract_files(&completion.text) {
            let path = check_filename(&path)?;
            let stored = format!("{}{}", UPLOADS_PREFIX, path);
            self.artifacts
                .put(&run.output_id, &stored, content.as_bytes())?;
            self.publish_artifact(run, &stored, content.len());
            files.push(path);
        }

        run.phases.push(PhaseRecord {
            step,
            provider: selection.provider.clone(),
            model: selection.model.clone(),
            artifact: Some(artifact),
            files: files.clone(),
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            latency_ms: completion.latency.as_millis() as u64,
            error: None,
        });
        run.updated_at = Utc::now();
        self.save(run);

        self.publish(
            &run.id,
            kinds::AGENT_PHASE_COMPLETED,
            json!({
                "step": step,
                "inputTokens": completion.input_tokens,
                "outputTokens": completion.output_tokens,
                "latencyMs": completion.latency.as_millis() as u64,
                "tokensUsed": run.tokens_used,
                "files": files,
            }),
        );
        info!(
            agent_run = %run.id,
            step = %step,
            tokens_used = run.tokens_used,
            files = files.len(),
            "agent phase completed"
        );

        if run.tokens_used > run.budget.max_tokens {
            return Err(GateError::invalid_state(
                codes::BUDGET_EXHAUSTED,
                format!(
                    "token budget exceeded: used {} of {}",
                    run.tokens_used, run.budget.max_tokens
                ),
            ));
        }
        Ok(completion.text)
    }

    /// `<step>.md`, or `fix-<n>.md` for the n-th fix.
    fn phase_artifact_name(&self, run: &AgentRun, step: Step) -> String {
        if step == Step::Fix {
            let n = run.phases.iter().filter(|p| p.step == Step::Fix).count() + 1;
            format!("fix-{}.md", n)
        } else {
            format!("{}.md", step)
        }
    }

    fn provider(&self, name: &str) -> Result<Arc<dyn LlmProvider>> {
        if let Some(provider) = self.providers.get(name) {
            return Ok(Arc::clone(provider));
        }
        let profile = self.config.provider(name).ok_or_else(|| {
            GateError::provider(
                codes::INVALID_PROVIDER,
                format!("unknown provider '{}'", name),
            )
        })?;
        let timeout = Duration::from_secs(profile.effective_timeout(&self.config.defaults));
        Ok(Arc::new(CommandProvider::new(name, profile, timeout)))
    }

    /// Settle the run and publish its terminal event.
    fn finish(&self, run: &mut AgentRun, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                run.status = AgentRunStatus::Completed;
                run.updated_at = Utc::now();
                self.save(run);
                self.publish(
                    &run.id,
                    kinds::AGENT_COMPLETED,
                    json!({
                        "status": run.status,
                        "outputId": run.output_id,
                        "tokensUsed": run.tokens_used,
                        "iterations": run.iterations,
                        "phases": run.phases.len(),
                    }),
                );
                info!(agent_run = %run.id, tokens_used = run.tokens_used, "agent run completed");
            }
            Err(e) => {
                run.fail_with(e.code(), e.to_string());
                self.save(run);
                self.publish(
                    &run.id,
                    kinds::AGENT_FAILED,
                    json!({
                        "status": run.status,
                        "outputId": run.output_id,
                        "error": run.error,
                        "tokensUsed": run.tokens_used,
                        "iterations": run.iterations,
                    }),
                );
                warn!(agent_run = %run.id, code = e.code(), error = %e, "agent run failed");
            }
        }
    }

    fn publish_artifact(&self, run: &AgentRun, filename: &str, bytes: usize) {
        self.publish(
            &run.id,
            kinds::AGENT_ARTIFACT,
            json!({ "outputId": run.output_id, "filename": filename, "bytes": bytes }),
        );
    }

    /// Record the run in memory and as an artifact. Failures to write the
    /// artifact are logged; the in-memory copy stays authoritative.
    fn save(&self, run: &AgentRun) {
        self.lock_runs().insert(run.id.clone(), run.clone());
        let written = serde_json::to_vec_pretty(run)
            .map_err(|e| GateError::IoError(format!("failed to serialize agent run: {}", e)))
            .and_then(|json| self.artifacts.put(&run.output_id, RUN_RECORD_ARTIFACT, &json));
        if let Err(e) = written {
            warn!(agent_run = %run.id, error = %e, "failed to persist agent run");
        }
    }

    fn publish(&self, run_id: &str, event_type: &str, payload: Value) {
        if let Err(e) = self.events.publish(run_id, event_type, payload) {
            warn!(agent_run = run_id, event_type, error = %e, "failed to publish event");
        }
    }

    fn lock_runs(&self) -> MutexGuard<'_, HashMap<String, AgentRun>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
