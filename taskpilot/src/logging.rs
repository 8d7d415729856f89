//! Development-time tracing for debugging the engine.
//!
//! Diagnostics go to stderr and never mix with the conversational output
//! on stdout; the step-by-step dialogue is the product surface, tracing is
//! not.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for development logging.
///
/// Reads `TASKPILOT_LOG`, falling back to `RUST_LOG`. Defaults to `warn`
/// if neither is set. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// TASKPILOT_LOG=taskpilot=debug taskpilot run "list large files"
/// ```
pub fn init() {
    let filter = std::env::var("TASKPILOT_LOG")
        .ok()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
