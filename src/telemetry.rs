// src/telemetry.rs
//! Tracing setup for binaries. The library itself only emits events.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FILTER: &str = "FEED_DISPATCH_LOG";
pub const ENV_LOG_FORMAT: &str = "FEED_DISPATCH_LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "dispatch=info,warn";

/// Install a global subscriber. Filter from `FEED_DISPATCH_LOG` (falls back to
/// `RUST_LOG`, then `dispatch=info,warn`); `FEED_DISPATCH_LOG_FORMAT=json`
/// switches to JSON lines. A second call is a no-op.
pub fn init_tracing() {
    let filter = std::env::var(ENV_LOG_FILTER)
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    if res.is_err() {
        tracing::debug!(target: "dispatch", "tracing already initialised");
    }
}
