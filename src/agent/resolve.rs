//! Provider, model and budget resolution for a phase.
//!
//! # Resolution Order
//!
//! Each field is resolved on its own:
//!
//! 1. Explicit request value, when present and not blank
//! 2. The step's entry in agents.yaml
//! 3. Compiled default (`claude-code` / `opus`)
//!
//! Budgets follow the same chain with `defaults` from agents.yaml between the
//! step entry and the compiled default, then get clamped to fixed bounds.

use super::config::{AgentsConfig, BUILTIN_PROVIDER};
use super::phase::{Budget, PhaseSelection, SelectionSource, Step};
use crate::error::{GateError, Result, codes};
use tracing::warn;

pub const DEFAULT_PROVIDER: &str = BUILTIN_PROVIDER;
pub const DEFAULT_MODEL: &str = "opus";

/// Upper bound (and default) of the token budget.
pub const MAX_TOKENS_LIMIT: u64 = 65_536;

/// Upper bound (and default) of the iteration cap.
pub const MAX_ITERATIONS_LIMIT: u64 = 100;

const MAX_MODEL_LEN: usize = 128;

/// Resolve provider and model of `step`.
///
/// # Errors
///
/// * `INVALID_PROVIDER` - The provider is neither built in nor configured
/// * `INVALID_MODEL` - The model is malformed or not offered by the provider
pub fn resolve_selection(
    step: Step,
    provider: Option<&str>,
    model: Option<&str>,
    config: &AgentsConfig,
) -> Result<PhaseSelection> {
    let step_config = config.step(step);

    let (provider, provider_source) = pick(
        provider,
        step_config.and_then(|s| s.provider.as_deref()),
        DEFAULT_PROVIDER,
    );
    let (model, model_source) = pick(
        model,
        step_config.and_then(|s| s.model.as_deref()),
        DEFAULT_MODEL,
    );

    let profile = config.provider(&provider).ok_or_else(|| {
        GateError::provider(
            codes::INVALID_PROVIDER,
            format!(
                "unknown provider '{}'\nAvailable providers: {}",
                provider,
                config.provider_names().join(", ")
            ),
        )
    })?;

    if !is_well_formed_model(&model) {
        return Err(GateError::provider(
            codes::INVALID_MODEL,
            format!("model '{}' is not a valid model name", model),
        ));
    }
    if !profile.models.is_empty() && !profile.models.iter().any(|m| m == &model) {
        return Err(GateError::provider(
            codes::INVALID_MODEL,
            format!(
                "provider '{}' does not offer model '{}' (available: {})",
                provider,
                model,
                profile.models.join(", ")
            ),
        ));
    }

    Ok(PhaseSelection {
        step,
        provider,
        model,
        provider_source: Some(provider_source),
        model_source: Some(model_source),
    })
}

/// Resolve and clamp the budget of a run starting at `step`.
pub fn resolve_budget(
    step: Step,
    max_tokens: Option<u64>,
    max_iterations: Option<u64>,
    config: &AgentsConfig,
) -> Budget {
    let step_config = config.step(step);

    let tokens = max_tokens
        .or_else(|| step_config.and_then(|s| s.max_tokens))
        .or(config.defaults.max_tokens)
        .unwrap_or(MAX_TOKENS_LIMIT);
    let iterations = max_iterations
        .or_else(|| step_config.and_then(|s| s.max_iterations))
        .or(config.defaults.max_iterations)
        .unwrap_or(MAX_ITERATIONS_LIMIT);

    Budget {
        max_tokens: clamp("max_tokens", tokens, MAX_TOKENS_LIMIT),
        max_iterations: clamp("max_iterations", iterations, MAX_ITERATIONS_LIMIT),
    }
}

fn pick(explicit: Option<&str>, persisted: Option<&str>, fallback: &str) -> (String, SelectionSource) {
    fn present(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|v| !v.is_empty())
    }

    if let Some(value) = present(explicit) {
        (value.to_string(), SelectionSource::Explicit)
    } else if let Some(value) = present(persisted) {
        (value.to_string(), SelectionSource::StepConfig)
    } else {
        (fallback.to_string(), SelectionSource::Default)
    }
}

fn clamp(field: &str, value: u64, limit: u64) -> u64 {
    let clamped = value.clamp(1, limit);
    if clamped != value {
        warn!(field, requested = value, applied = clamped, "agent budget clamped");
    }
    clamped
}

/// Model names are one token of letters, digits and `-._:/@`.
fn is_well_formed_model(model: &str) -> bool {
    !model.is_empty()
        && model.len() <= MAX_MODEL_LEN
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@'))
}
