//! Metric helpers for the runner.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "plugin_runner_connections_active";
/// Name of the counter tracking decoded frames.
pub const FRAMES_DECODED: &str = "plugin_runner_frames_decoded_total";
/// Name of the counter tracking per-connection error occurrences.
pub const ERRORS_TOTAL: &str = "plugin_runner_errors_total";
/// Name of the counter tracking panics in connection tasks.
pub const CONNECTION_PANICS: &str = "plugin_runner_connection_panics_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a decoded frame.
pub fn inc_frames_decoded() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DECODED).increment(1);
}

/// Record a per-connection error, labelled by category.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a panic in a connection task.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
