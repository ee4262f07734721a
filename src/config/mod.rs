//! Validation configuration for gatekeep.
//!
//! Configuration is a flat table of typed string values (`.gatekeep/config.yaml`)
//! grouped by category. Operators edit it through [`ConfigStore`]; validators
//! only ever see an immutable [`ConfigSnapshot`] captured when their gate
//! starts, so an edit never tears a running gate.
//!
//! Unknown keys are preserved, unknown YAML fields are ignored, and malformed
//! values fall back to the compiled default with a warning.

pub mod defaults;
mod snapshot;
mod store;
mod types;

#[cfg(test)]
mod tests;

pub use defaults::{DEFAULTS, DefaultEntry, keys};
pub use snapshot::ConfigSnapshot;
pub use store::ConfigStore;
pub use types::{ConfigEntry, ConfigFile, ValueType};
