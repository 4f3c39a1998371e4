//! Async stream adapter feeding raw I/O to diagnostic stages.
//!
//! `ObservedStream` sits between the socket and the framing stage. Every
//! chunk read is reported to each diagnostic stage, in pipeline order, before
//! the framing decoder sees it; every chunk accepted by the socket on write is
//! reported after the fact.

use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::{connection::ConnectionId, diagnostics::DiagnosticStage};

/// Shared, immutable list of diagnostic stages.
pub type DiagnosticChain = Arc<[Arc<dyn DiagnosticStage>]>;

/// A stream adapter reporting raw I/O to diagnostic stages.
pub struct ObservedStream<S> {
    id: ConnectionId,
    stages: DiagnosticChain,
    inner: S,
}

impl<S> ObservedStream<S> {
    /// Wrap `inner`, notifying `stages` that the connection opened.
    pub fn new(id: ConnectionId, stages: DiagnosticChain, inner: S) -> Self {
        for stage in stages.iter() {
            stage.on_open(id);
        }
        Self { id, stages, inner }
    }
}

impl<S> Drop for ObservedStream<S> {
    fn drop(&mut self) {
        for stage in self.stages.iter() {
            stage.on_close(self.id);
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ObservedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let polled = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = polled
            && let Some(chunk) = buf.filled().get(before..)
            && !chunk.is_empty()
        {
            for stage in self.stages.iter() {
                stage.on_read(self.id, chunk);
            }
        }
        polled
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ObservedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let polled = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = polled
            && let Some(chunk) = buf.get(..written)
            && !chunk.is_empty()
        {
            for stage in self.stages.iter() {
                stage.on_write(self.id, chunk);
            }
        }
        polled
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S: Unpin> Unpin for ObservedStream<S> {}
