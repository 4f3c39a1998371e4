//! Diagnostic stages observing raw connection I/O.
//!
//! Diagnostic stages sit at the front of every connection pipeline and see
//! bytes exactly as they cross the socket, before framing. They are shared
//! read-only between connections, so implementations must not keep
//! per-connection state.

use std::fmt::Write as _;

use crate::connection::ConnectionId;

/// Log target used by [`LoggingStage`].
pub const WIRE_TARGET: &str = "plugin_runner::wire";

/// Observer of raw bytes on a connection.
///
/// All hooks default to no-ops.
pub trait DiagnosticStage: Send + Sync + 'static {
    /// Stage name recorded in the pipeline.
    fn name(&self) -> &'static str;

    /// Called once when the connection's pipeline is installed.
    fn on_open(&self, _id: ConnectionId) {}

    /// Called with every chunk read from the socket.
    fn on_read(&self, _id: ConnectionId, _bytes: &[u8]) {}

    /// Called with every chunk written to the socket.
    fn on_write(&self, _id: ConnectionId, _bytes: &[u8]) {}

    /// Called once when the connection's stream is dropped.
    fn on_close(&self, _id: ConnectionId) {}
}

/// Logs connection events and hex dumps of raw I/O at `debug` level.
#[derive(Clone, Debug)]
pub struct LoggingStage {
    hexdump_limit: usize,
}

impl LoggingStage {
    /// Default number of bytes included in each hex dump.
    pub const DEFAULT_HEXDUMP_LIMIT: usize = 64;

    /// Create a logging stage dumping at most `hexdump_limit` bytes per event.
    #[must_use]
    pub const fn new(hexdump_limit: usize) -> Self { Self { hexdump_limit } }
}

impl Default for LoggingStage {
    fn default() -> Self { Self::new(Self::DEFAULT_HEXDUMP_LIMIT) }
}

impl DiagnosticStage for LoggingStage {
    fn name(&self) -> &'static str { "logger" }

    fn on_open(&self, id: ConnectionId) {
        tracing::debug!(target: WIRE_TARGET, connection = %id, "REGISTERED");
    }

    fn on_read(&self, id: ConnectionId, bytes: &[u8]) {
        tracing::debug!(
            target: WIRE_TARGET,
            connection = %id,
            len = bytes.len(),
            dump = %hexdump(bytes, self.hexdump_limit),
            "READ"
        );
    }

    fn on_write(&self, id: ConnectionId, bytes: &[u8]) {
        tracing::debug!(
            target: WIRE_TARGET,
            connection = %id,
            len = bytes.len(),
            dump = %hexdump(bytes, self.hexdump_limit),
            "WRITE"
        );
    }

    fn on_close(&self, id: ConnectionId) {
        tracing::debug!(target: WIRE_TARGET, connection = %id, "CLOSED");
    }
}

/// Render up to `limit` bytes as space-separated hex, marking truncation.
#[must_use]
pub fn hexdump(bytes: &[u8], limit: usize) -> String {
    let shown = bytes.get(..limit).unwrap_or(bytes);
    let mut out = String::with_capacity(shown.len() * 3 + 8);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    if shown.len() < bytes.len() {
        let _ = write!(out, " ..(+{})", bytes.len() - shown.len());
    }
    out
}
