//! Log output for testbench runs.
//!
//! Events carry the simulated time as a `sim_ns` field, so wall-clock
//! timestamps are left out.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber, filtered by `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init() {
    init_with("info");
}

pub fn init_with(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_test_writer(),
        )
        .try_init();
}
