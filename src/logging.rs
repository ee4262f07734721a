//! Diagnostic tracing for gatekeep.
//!
//! Tracing output is operator diagnostics only: it goes to stderr and is
//! controlled by `RUST_LOG`. Run state and events are persisted separately
//! under `.gatekeep/` and are unaffected by the log level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output: stderr, compact format.
/// `verbose` raises the default to `gatekeep=debug` when `RUST_LOG` is unset.
///
/// # Example
/// ```bash
/// RUST_LOG=gatekeep=info gatekeep submit ...
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "warn,gatekeep=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
