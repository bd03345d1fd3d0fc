//! Logging initialization for the portal client.
//!
//! Sets up `tracing` with an env-filter and a compact stderr formatter.
//! `TIDEWATCH_LOG_JSON=1` switches to JSONL output for log shipping.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system.
///
/// The filter is taken from `RUST_LOG` when set, otherwise from the provided
/// default level. Safe to call once per process; subsequent calls are no-ops.
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("portal started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let json = std::env::var("TIDEWATCH_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(false)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
}
