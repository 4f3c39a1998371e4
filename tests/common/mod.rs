//! Shared helpers for integration tests.
#![allow(dead_code, reason = "each test crate uses a subset of the helpers")]

use std::{io, time::Duration};

use async_trait::async_trait;
use plugin_runner::{
    FramedConnection,
    RequestHandler,
    RunnerFrame,
    RunnerFrameCodec,
    ServerHandle,
    address::{LocalAddress, resolve},
};
use rstest::fixture;
use tempfile::TempDir;
use tokio::{sync::mpsc, time::timeout};

/// Fresh directory to hold one test's socket files.
#[fixture]
pub fn socket_dir() -> TempDir { tempfile::tempdir().expect("create socket dir") }

/// Configured `unix:` location for `name` inside `dir`.
pub fn configured(dir: &TempDir, name: &str) -> String {
    format!("unix:{}", dir.path().join(name).display())
}

/// Resolved address for `name` inside `dir`.
pub fn address(dir: &TempDir, name: &str) -> LocalAddress {
    resolve(&configured(dir, name)).expect("valid socket address")
}

/// Encode one runner frame as it appears on the wire.
pub fn wire_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).expect("payload fits the header");
    let [_, b1, b2, b3] = len.to_be_bytes();
    let mut out = vec![kind, b1, b2, b3];
    out.extend_from_slice(payload);
    out
}

/// Handler forwarding every decoded frame to a channel.
pub struct Forward(pub mpsc::UnboundedSender<RunnerFrame>);

#[async_trait]
impl RequestHandler<RunnerFrameCodec> for Forward {
    fn name(&self) -> &'static str { "forward" }

    async fn handle(&self, conn: &mut FramedConnection<RunnerFrameCodec>) -> io::Result<()> {
        while let Some(frame) = conn.next_frame().await {
            let _ = self.0.send(frame?);
        }
        Ok(())
    }
}

/// Handler that panics on the first frame.
pub struct PanicOnFrame;

#[async_trait]
impl RequestHandler<RunnerFrameCodec> for PanicOnFrame {
    async fn handle(&self, conn: &mut FramedConnection<RunnerFrameCodec>) -> io::Result<()> {
        if let Some(frame) = conn.next_frame().await {
            let frame = frame?;
            panic!("handler failed on frame kind {}", frame.kind);
        }
        Ok(())
    }
}

/// Wait until `handle` reports `expected` live connections.
pub async fn wait_for_connections(handle: &ServerHandle, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while handle.active_connection_count() != expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("connection count reached in time");
}
