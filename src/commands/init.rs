//! Implementation of the `gatekeep init` command.
//!
//! # What `gatekeep init` does
//!
//! 1. Creates `.gatekeep/` with its runs, events, artifacts, sandboxes and
//!    locks directories
//! 2. Seeds `config.yaml` with every compiled default that is missing
//! 3. Writes an `agents.yaml` template (if missing)
//! 4. Adds `.gatekeep/` to `.git/info/exclude`
//!
//! Idempotent: existing configuration values are never overwritten.

use crate::agent::AgentsConfig;
use crate::config::ConfigStore;
use crate::context::{GateContext, STATE_DIR};
use crate::error::{GateError, Result};
use crate::exit_codes;
use crate::fs::atomic_write_file;
use std::fs;
use tracing::info;

pub fn cmd_init(ctx: &GateContext) -> Result<i32> {
    let seeded = scaffold(ctx)?;

    println!("Initialized gatekeep.");
    println!();
    println!("State directory: {}", ctx.state_dir.display());
    if seeded.is_empty() {
        println!("Configuration:   unchanged");
    } else {
        println!("Configuration:   {} default(s) seeded", seeded.len());
    }
    println!();
    println!("Submit a run with `gatekeep submit --output-id <id> --task <text> --manifest <path:ACTION,...>`.");
    Ok(exit_codes::SUCCESS)
}

/// Create the state layout. Returns the configuration keys seeded.
pub(super) fn scaffold(ctx: &GateContext) -> Result<Vec<String>> {
    ctx.create_dirs()?;

    let seeded = ConfigStore::open(ctx.config_path())?.seed()?;

    let agents_path = ctx.agents_config_path();
    if !agents_path.exists() {
        atomic_write_file(&agents_path, &AgentsConfig::default().to_yaml()?)?;
    }

    add_to_git_exclude(ctx)?;
    info!(state_dir = %ctx.state_dir.display(), seeded = seeded.len(), "initialized");
    Ok(seeded)
}

/// Add `.gatekeep/` to `.git/info/exclude`.
pub(super) fn add_to_git_exclude(ctx: &GateContext) -> Result<()> {
    let git_dir = ctx.repo_root.join(".git");
    if !git_dir.is_dir() {
        // Linked worktrees and submodules keep a `.git` file; nothing to do.
        return Ok(());
    }
    let exclude_path = git_dir.join("info").join("exclude");

    if let Some(parent) = exclude_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            GateError::UserError(format!("failed to create git info directory: {}", e))
        })?;
    }

    let entry = format!("{}/", STATE_DIR);
    let existing = fs::read_to_string(&exclude_path).unwrap_or_default();
    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("\n# gatekeep state\n");
    content.push_str(&entry);
    content.push('\n');
    atomic_write_file(&exclude_path, &content)
}
