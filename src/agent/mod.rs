//! Generative agent pipeline.
//!
//! An agent run walks one or more phases (`plan`, `spec`, `implement`,
//! `fix`). Each phase renders a prompt, sends it to a provider and stores the
//! reply as an artifact under the run's output id. Files the reply carries in
//! `file:<path>` fenced blocks are stored under `files/`, where the gate
//! orchestrator overlays them into the next sandbox of that output id.
//!
//! - **Config**: provider profiles and per-step defaults (`agents.yaml`)
//! - **Resolve**: provider, model and budget fallback chains
//! - **Provider**: the [`LlmProvider`] seam and the command-template provider
//! - **Runner**: run bookkeeping, events and the fix loop
//!
//! Providers are subprocesses with configurable command templates, so any
//! CLI-based model tool works without a client library.

mod config;
mod output;
mod phase;
mod prompt;
mod provider;
mod resolve;
mod runner;
mod template;


pub use config::{AgentDefaults, AgentsConfig, BUILTIN_PROVIDER, ProviderProfile, StepConfig};
pub use output::extract_files;
pub use phase::{
    AgentRun, AgentRunStatus, Budget, PhaseHandle, PhaseRecord, PhaseSelection, SelectionSource,
    Step, events_url,
};
pub use prompt::{PromptContext, default_template, render_prompt};
pub use provider::{CommandProvider, Completion, CompletionRequest, LlmProvider, estimate_tokens};
pub use resolve::{
    DEFAULT_MODEL, DEFAULT_PROVIDER, MAX_ITERATIONS_LIMIT, MAX_TOKENS_LIMIT, resolve_budget,
    resolve_selection,
};
pub use runner::{AgentRequest, AgentRunner, RUN_RECORD_ARTIFACT};
pub use template::{TemplateError, render_template, vars};
