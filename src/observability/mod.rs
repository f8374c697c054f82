// src/observability/mod.rs
//! Diagnostics for the trace engine itself
//!
//! The engine logs through `tracing` and counts flushes and deliveries through
//! `metrics`. Hosts that want to see either install the subscriber and the
//! recorder below; without them both are no-ops.

use crate::utils::errors::{Result, TraceError};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Buffers handed to a backend
pub const FLUSHES_TOTAL: &str = "memtrace_flushes_total";

/// Bytes handed to a backend
pub const BYTES_FLUSHED_TOTAL: &str = "memtrace_bytes_flushed_total";

/// Snapshots written to the collector connection
pub const SNAPSHOTS_SENT_TOTAL: &str = "memtrace_snapshots_sent_total";

/// Acknowledgments received from the collector
pub const ACKS_TOTAL: &str = "memtrace_acks_total";

/// Install a global `tracing` subscriber filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() -> Result<()> {
    init_tracing_with(false)
}

/// Install a global `tracing` subscriber, optionally emitting JSON lines
pub fn init_tracing_with(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| {
        TraceError::ConfigFailed(format!("Failed to install tracing subscriber: {}", e))
    })
}

/// Install the Prometheus recorder and return a handle for rendering
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().map_err(|e| {
        TraceError::ConfigFailed(format!("Failed to install metrics recorder: {}", e))
    })
}

/// Count one buffer of `bytes` handed to a backend
pub(crate) fn record_flush(bytes: usize) {
    metrics::counter!(FLUSHES_TOTAL).increment(1);
    metrics::counter!(BYTES_FLUSHED_TOTAL).increment(bytes as u64);
}
