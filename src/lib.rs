//! Gatekeep: sandboxed, gate-based validation of machine-generated code
//! changes.
//!
//! A run materializes the proposed change in its own git worktree (see
//! [`sandbox`]), then the [`orchestrator`] executes the gates of its type in
//! order, each a set of [`validate`] checks. Progress is published through
//! [`events`] as a resumable, sequence-numbered stream. The [`agent`] module
//! produces changes in plan, spec, implement and fix phases.

pub mod agent;
pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod git;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod run;
pub mod sandbox;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;
