//! Logging setup and lightweight in-process metrics.
//!
//! Metrics are atomics behind `DashMap` label sets, rendered as Prometheus
//! text by `AgentMetrics::render`.

pub mod metrics;

pub use metrics::AgentMetrics;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the fmt subscriber filtered by `RUST_LOG`. Later calls are no-ops.
pub fn init_tracing() {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
}
