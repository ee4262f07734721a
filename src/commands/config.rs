//! Implementation of the `gatekeep config` commands.

use crate::cli::{ConfigAction, ConfigCommand};
use crate::config::ConfigStore;
use crate::context::GateContext;
use crate::error::{GateError, Result};
use crate::exit_codes;

pub fn dispatch_config(ctx: &GateContext, cmd: ConfigCommand) -> Result<i32> {
    ctx.ensure_initialized()?;
    let store = ConfigStore::open(ctx.config_path())?;

    match cmd.action {
        ConfigAction::List => {
            let entries = store.list();
            if entries.is_empty() {
                println!("No configuration. Run `gatekeep config seed` to insert defaults.");
            }
            let mut category = String::new();
            for (key, entry) in entries_by_category(entries) {
                if entry.category != category {
                    category = entry.category.clone();
                    println!("[{}]", category);
                }
                println!("  {:<32} {:<8} {}", key, entry.value_type.as_str(), entry.value);
            }
        }
        ConfigAction::Get { key } => {
            let entry = store.get(&key).ok_or_else(|| {
                GateError::UserError(format!(
                    "configuration key '{}' is not set.\n\
                     Run `gatekeep config list` to see the stored keys.",
                    key
                ))
            })?;
            println!("{}", entry.value);
        }
        ConfigAction::Set { key, value } => {
            let entry = store.set(&key, &value)?;
            println!("{} = {} ({})", key.trim(), entry.value, entry.value_type.as_str());
        }
        ConfigAction::Seed => {
            let inserted = store.seed()?;
            if inserted.is_empty() {
                println!("All defaults already present.");
            } else {
                println!("Inserted {} default(s):", inserted.len());
                for key in inserted {
                    println!("  {}", key);
                }
            }
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn entries_by_category(
    mut entries: Vec<(String, crate::config::ConfigEntry)>,
) -> Vec<(String, crate::config::ConfigEntry)> {
    entries.sort_by(|a, b| a.1.category.cmp(&b.1.category).then_with(|| a.0.cmp(&b.0)));
    entries
}
