//! Tracing setup for binaries and tests that embed the engine.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is left to the host. [`init`] installs a compact fmt subscriber filtered
//! by `VELLUM_LOG` (RUST_LOG syntax, default `info`).

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "VELLUM_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install the default subscriber. Returns `false` when a global
/// subscriber was already set.
pub fn init() -> bool {
    init_with(filter_from_env())
}

/// Install a subscriber with an explicit filter.
pub fn init_with(filter: EnvFilter) -> bool {
    let layer = fmt::layer().with_target(true).compact();
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .is_ok()
}

/// `VELLUM_LOG`, or `info` when it is unset or does not parse.
pub fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
