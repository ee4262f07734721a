//! Entry point for the `gatekeep` CLI.
//!
//! Parses arguments, dispatches to the command handler and maps errors to
//! exit codes.

use gatekeep::cli::Cli;
use gatekeep::{commands, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(cli.command) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
