//! Validator engine.
//!
//! A validator is a named check implementing [`Validator`]. The registry maps
//! stable codes to validators; the engine runs the validators of one gate
//! against a [`ValidationContext`] and turns every outcome (including errors
//! and panics) into a [`crate::run::ValidatorResult`].

pub mod builtin;
mod context;
mod engine;
mod globs;
pub mod imports;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use context::ValidationContext;
pub use engine::{execute_gate, execute_validator};
pub use globs::PathMatcher;
pub use registry::ValidatorRegistry;
pub use types::{Validator, ValidatorOutcome};
