//! CLI argument parsing for gatekeep.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Gatekeep: sandboxed, gate-based validation of generated code changes.
///
/// Every run gets its own git worktree. Gates run their validators against
/// it in order; a hard-blocking failure stops the run until it is fixed,
/// rerun or bypassed. Run progress is an event stream that can be resumed.
#[derive(Parser, Debug)]
#[command(name = "gatekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log debug diagnostics to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for gatekeep.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize gatekeep in the current repository.
    ///
    /// Creates `.gatekeep/`, seeds the validation configuration and keeps the
    /// state directory out of git.
    Init,

    /// Submit a run and, unless `--no-execute`, execute its gates.
    Submit(SubmitArgs),

    /// Show one run with its gates and validator results.
    Show(ShowArgs),

    /// List runs, newest first.
    List(ListArgs),

    /// Stream a run's events as server-sent-event frames.
    ///
    /// Replays retained events after the resume point, then follows live
    /// events until the run finishes.
    Events(EventsArgs),

    /// Execute a single gate of a run.
    Gate(GateArgs),

    /// Rerun one gate of a finished run, replacing only that gate's results.
    Rerun(GateArgs),

    /// Bypass a FAILED hard-blocking validator.
    Bypass(BypassArgs),

    /// Abort a run that has not finished.
    Abort(RunIdArgs),

    /// Upload files into a run's sandbox.
    Files(FilesArgs),

    /// Validation configuration commands.
    Config(ConfigCommand),

    /// Generative agent commands.
    Agent(AgentCommand),
}

/// Arguments for the `submit` command.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Human label; also the artifact namespace of the run.
    #[arg(long)]
    pub output_id: String,

    /// Task description the change implements.
    #[arg(long)]
    pub task: String,

    /// Declared changes as `path:ACTION,…` (ACTION is CREATE, MODIFY or DELETE).
    #[arg(long, default_value = "")]
    pub manifest: String,

    /// Run type: `contract` or `execution`.
    #[arg(long = "type", default_value = "contract")]
    pub run_type: String,

    /// CONTRACT run an execution run builds on.
    #[arg(long)]
    pub contract_run_id: Option<String>,

    /// Ref the change is compared against.
    #[arg(long, default_value = "main")]
    pub base_ref: String,

    /// Ref holding the change.
    #[arg(long, default_value = "HEAD")]
    pub target_ref: String,

    /// Project directory (defaults to the repository root).
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Only record the run; do not execute gates.
    #[arg(long)]
    pub no_execute: bool,

    /// Print the run as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show` command.
#[derive(Args, Debug)]
pub struct ShowArgs {
    pub run_id: String,

    /// Print the run as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print the runs as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `events` command.
#[derive(Args, Debug)]
pub struct EventsArgs {
    pub run_id: String,

    /// Resume after this sequence number (as the `Last-Event-Id` header).
    #[arg(long)]
    pub last_event_id: Option<String>,

    /// Resume point given as the `lastEventId` query parameter; the header
    /// value wins when both are valid.
    #[arg(long)]
    pub query_last_event_id: Option<String>,

    /// Print what is available and exit instead of following.
    #[arg(long)]
    pub no_follow: bool,
}

/// Arguments for the `gate` and `rerun` commands.
#[derive(Args, Debug)]
pub struct GateArgs {
    pub run_id: String,

    /// Gate number (0-3).
    pub gate: u8,

    /// Print the run as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `bypass` command.
#[derive(Args, Debug)]
pub struct BypassArgs {
    pub run_id: String,

    /// Validator code, e.g. `TEST_EXECUTION`.
    pub validator_code: String,

    /// Why the failure is acceptable (kept in the audit trail).
    #[arg(long)]
    pub reason: Option<String>,
}

/// Arguments for commands taking only a run id.
#[derive(Args, Debug)]
pub struct RunIdArgs {
    pub run_id: String,
}

/// Arguments for the `files` command.
#[derive(Args, Debug)]
pub struct FilesArgs {
    pub run_id: String,

    /// Files to upload. `local=dest` stores `local` as `dest`; otherwise the
    /// path is used as given.
    #[arg(required = true)]
    pub files: Vec<String>,
}

/// Configuration subcommands.
#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// List every configuration entry.
    List,

    /// Print one value.
    Get { key: String },

    /// Set a value. Known keys are type-checked.
    Set { key: String, value: String },

    /// Insert compiled defaults that are missing. Never overwrites.
    Seed,
}

/// Agent subcommands.
#[derive(Args, Debug)]
pub struct AgentCommand {
    #[command(subcommand)]
    pub action: AgentAction,
}

#[derive(Subcommand, Debug)]
pub enum AgentAction {
    /// Run a single phase (plan, spec, implement or fix).
    Run(AgentRunArgs),

    /// Run plan, spec and implement, then fix until an execution run passes.
    Pipeline(AgentPipelineArgs),

    /// List providers and per-step defaults from agents.yaml.
    Providers,
}

/// Options shared by agent commands.
#[derive(Args, Debug)]
pub struct AgentOptions {
    /// Task description.
    #[arg(long)]
    pub task: String,

    /// Provider identifier (falls back to agents.yaml, then `claude-code`).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name (falls back to agents.yaml, then `opus`).
    #[arg(long)]
    pub model: Option<String>,

    /// Artifact namespace (defaults to the agent run id).
    #[arg(long)]
    pub output_id: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u64>,

    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Project directory (defaults to the repository root).
    #[arg(long)]
    pub project: Option<PathBuf>,
}

/// Arguments for `agent run`.
#[derive(Args, Debug)]
pub struct AgentRunArgs {
    /// Phase to run.
    pub step: String,

    #[command(flatten)]
    pub options: AgentOptions,

    /// Validation failures for a fix phase.
    #[arg(long)]
    pub feedback: Option<String>,
}

/// Arguments for `agent pipeline`.
#[derive(Args, Debug)]
pub struct AgentPipelineArgs {
    #[command(flatten)]
    pub options: AgentOptions,

    /// PASSED CONTRACT run whose manifest and refs the produced change is
    /// validated against.
    #[arg(long)]
    pub contract_run_id: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
