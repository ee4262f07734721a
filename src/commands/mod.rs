//! Command implementations for gatekeep.
//!
//! [`dispatch`] routes each parsed command to its `cmd_*` handler. Handlers
//! print their own output and return the process exit code.

mod agent;
mod config;
mod events;
mod init;
mod report;
mod runs;

#[cfg(test)]
mod tests;

use crate::cli::Command;
use crate::context::GateContext;
use crate::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<i32> {
    let ctx = GateContext::resolve()?;
    match command {
        Command::Init => init::cmd_init(&ctx),
        Command::Submit(args) => runs::cmd_submit(&ctx, args),
        Command::Show(args) => runs::cmd_show(&ctx, args),
        Command::List(args) => runs::cmd_list(&ctx, args),
        Command::Events(args) => events::cmd_events(&ctx, args),
        Command::Gate(args) => runs::cmd_gate(&ctx, args),
        Command::Rerun(args) => runs::cmd_rerun(&ctx, args),
        Command::Bypass(args) => runs::cmd_bypass(&ctx, args),
        Command::Abort(args) => runs::cmd_abort(&ctx, args),
        Command::Files(args) => runs::cmd_files(&ctx, args),
        Command::Config(cmd) => config::dispatch_config(&ctx, cmd),
        Command::Agent(cmd) => agent::dispatch_agent(&ctx, cmd),
    }
}
