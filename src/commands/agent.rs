//! Implementation of the `gatekeep agent` commands.
//!
//! - `agent run <step>` runs one phase and prints its handle
//! - `agent pipeline` runs every phase, validating the produced files with
//!   an EXECUTION run after implement and after each fix
//! - `agent providers` lists what `agents.yaml` resolves to

use super::report::{blocking_feedback, run_exit_code};
use super::runs::{open_orchestrator, resolve_project};
use crate::agent::{
    AgentRequest, AgentRun, AgentRunStatus, AgentRunner, Step, resolve_budget, resolve_selection,
};
use crate::cli::{AgentAction, AgentCommand, AgentOptions, AgentPipelineArgs, AgentRunArgs};
use crate::context::GateContext;
use crate::error::Result;
use crate::exit_codes;
use crate::orchestrator::GateOrchestrator;
use crate::run::{RunRequest, RunStatus, RunType};
use std::sync::Arc;
use tracing::info;

pub fn dispatch_agent(ctx: &GateContext, cmd: AgentCommand) -> Result<i32> {
    match cmd.action {
        AgentAction::Run(args) => cmd_agent_run(ctx, args),
        AgentAction::Pipeline(args) => cmd_agent_pipeline(ctx, args),
        AgentAction::Providers => cmd_agent_providers(ctx),
    }
}

fn open_runner(ctx: &GateContext, orchestrator: &GateOrchestrator) -> Result<AgentRunner> {
    AgentRunner::open(ctx, Arc::clone(orchestrator.events()), orchestrator.config())
}

fn agent_request(
    ctx: &GateContext,
    options: AgentOptions,
    feedback: Option<String>,
) -> Result<AgentRequest> {
    Ok(AgentRequest {
        task: options.task,
        project_path: resolve_project(ctx, options.project)?,
        output_id: options.output_id,
        provider: options.provider,
        model: options.model,
        max_tokens: options.max_tokens,
        max_iterations: options.max_iterations,
        feedback,
    })
}

/// Execute the `gatekeep agent run` command.
pub fn cmd_agent_run(ctx: &GateContext, args: AgentRunArgs) -> Result<i32> {
    let step: Step = args.step.parse()?;
    let orchestrator = open_orchestrator(ctx)?;
    let runner = open_runner(ctx, &orchestrator)?;

    let request = agent_request(ctx, args.options, args.feedback)?;
    let handle = runner.run_single_phase(step, &request)?;
    let run = runner.get(&handle.run_id)?;

    println!(
        "Agent run {} ({} via {} / {})",
        handle.run_id, handle.phase.step, handle.phase.provider, handle.phase.model
    );
    print_agent_run(&run);
    println!("Events:     {}", handle.events_url);
    Ok(agent_exit_code(&run))
}

/// Execute the `gatekeep agent pipeline` command.
///
/// The contract run supplies the manifest and refs; every validation round
/// submits an EXECUTION run under the agent's output id, so the files the
/// agent produced are overlaid into its sandbox.
pub fn cmd_agent_pipeline(ctx: &GateContext, args: AgentPipelineArgs) -> Result<i32> {
    let orchestrator = open_orchestrator(ctx)?;
    let contract = orchestrator.get_run(&args.contract_run_id)?;
    let runner = open_runner(ctx, &orchestrator)?;
    let request = agent_request(ctx, args.options, None)?;

    let mut last_status = None;
    let run = runner.run_pipeline(&request, |agent_run| {
        let execution = orchestrator.submit_run(RunRequest {
            output_id: agent_run.output_id.clone(),
            task_prompt: agent_run.task.clone(),
            manifest: contract.manifest.clone(),
            run_type: RunType::Execution,
            contract_run_id: Some(contract.id.clone()),
            project_path: contract.project_path.clone(),
            base_ref: contract.base_ref.clone(),
            target_ref: contract.target_ref.clone(),
        })?;
        let execution = orchestrator.execute_run(&execution.id)?;
        info!(
            agent_run = %agent_run.id,
            execution_run = %execution.id,
            status = %execution.status,
            "validated agent output"
        );
        println!("Validation run {} [{}]", execution.id, execution.status);
        last_status = Some(run_exit_code(&execution));

        if execution.status == RunStatus::Failed {
            let mut feedback = blocking_feedback(&execution);
            if feedback.is_empty()
                && let Some(error) = &execution.error
            {
                feedback.push(format!("{}: {}", error.code, error.message));
            }
            Ok(Some(feedback.join("\n")))
        } else {
            Ok(None)
        }
    })?;

    println!("Agent run {}", run.id);
    print_agent_run(&run);
    match (run.status, last_status) {
        (AgentRunStatus::Completed, Some(code)) => Ok(code),
        _ => Ok(agent_exit_code(&run)),
    }
}

/// Execute the `gatekeep agent providers` command.
pub fn cmd_agent_providers(ctx: &GateContext) -> Result<i32> {
    let config = crate::agent::AgentsConfig::load_or_default(ctx.agents_config_path())?;

    println!("Providers:");
    for name in config.provider_names() {
        if let Some(profile) = config.provider(&name) {
            println!("  {:<16} {}", name, profile.command);
            if !profile.models.is_empty() {
                println!("  {:<16} models: {}", "", profile.models.join(", "));
            }
        }
    }

    println!();
    println!("Steps:");
    for step in Step::ALL {
        let selection = resolve_selection(step, None, None, &config)?;
        let budget = resolve_budget(step, None, None, &config);
        let custom = config
            .step(step)
            .and_then(|s| s.prompt_template.as_deref())
            .is_some_and(|t| !t.trim().is_empty());
        println!(
            "  {:<10} {} / {}  max_tokens={} max_iterations={}{}",
            step.as_str(),
            selection.provider,
            selection.model,
            budget.max_tokens,
            budget.max_iterations,
            if custom { "  (custom prompt)" } else { "" }
        );
    }
    Ok(exit_codes::SUCCESS)
}

fn agent_exit_code(run: &AgentRun) -> i32 {
    match run.status {
        AgentRunStatus::Failed => exit_codes::USER_ERROR,
        AgentRunStatus::Running | AgentRunStatus::Completed => exit_codes::SUCCESS,
    }
}

fn print_agent_run(run: &AgentRun) {
    println!("Status:     {:?}", run.status);
    println!("Output:     {}", run.output_id);
    println!(
        "Tokens:     {} / {}  iterations {} / {}",
        run.tokens_used, run.budget.max_tokens, run.iterations, run.budget.max_iterations
    );
    for phase in &run.phases {
        print!(
            "  {:<10} {:<14} {}ms",
            phase.step.as_str(),
            phase.artifact.as_deref().unwrap_or("-"),
            phase.latency_ms
        );
        if !phase.files.is_empty() {
            print!("  files: {}", phase.files.join(", "));
        }
        if let Some(error) = &phase.error {
            print!("  error: {}", error);
        }
        println!();
    }
    if let Some(error) = &run.error {
        println!("Error:      [{}] {}", error.code, error.message);
    }
}
