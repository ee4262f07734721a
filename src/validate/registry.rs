//! Validators keyed by stable code.

use super::builtin;
use super::types::Validator;
use crate::run::Gate;
use std::sync::Arc;

/// Ordered set of validators, unique by code.
///
/// Registration order is execution and reporting order within a gate.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in validator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for validator in builtin::all() {
            registry.register(validator);
        }
        registry
    }

    /// Add a validator, replacing any previous one with the same code.
    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        match self
            .validators
            .iter_mut()
            .find(|v| v.code() == validator.code())
        {
            Some(slot) => *slot = validator,
            None => self.validators.push(validator),
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn Validator>> {
        self.validators.iter().find(|v| v.code() == code).cloned()
    }

    /// Validators of `gate`, in registration order.
    pub fn for_gate(&self, gate: Gate) -> Vec<Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| v.gate() == gate)
            .cloned()
            .collect()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.code()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}
