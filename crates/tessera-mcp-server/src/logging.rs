//! Tracing setup.
//!
//! `MCP_LOG_LEVEL` (falling back to `RUST_LOG`) seeds the filter. In stdio
//! mode everything must go to stderr so stdout stays pure JSON-RPC; the
//! HTTP path uses the same writer for consistency.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the log filter.
pub const LOG_LEVEL_ENV: &str = "MCP_LOG_LEVEL";

fn env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber, writing to stderr. Safe to call more
/// than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
