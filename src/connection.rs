//! Framed view of a single accepted connection.
//!
//! A [`FramedConnection`] owns the stage instances built for one connection:
//! the diagnostic wrapper around the socket and the framing decoder and
//! encoder. Frames are yielded in the order their bytes arrived.

use std::{fmt, io};

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf, split};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};

use crate::{
    codec::FrameCodec,
    observed_stream::ObservedStream,
    pipeline::{Pipeline, StageDescriptor},
};

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// Byte stream a connection can run over.
pub trait ConnectionStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ConnectionStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

type BoxedStream = Box<dyn ConnectionStream>;

/// A connection with its pipeline installed.
pub struct FramedConnection<C: FrameCodec> {
    id: ConnectionId,
    stages: Vec<StageDescriptor>,
    reader: FramedRead<ReadHalf<ObservedStream<BoxedStream>>, C::Decoder>,
    writer: FramedWrite<WriteHalf<ObservedStream<BoxedStream>>, C::Encoder>,
    draining: CancellationToken,
}

impl<C: FrameCodec> FramedConnection<C> {
    /// Install `pipeline` on `stream`.
    ///
    /// `draining` is cancelled when the server begins shutting down.
    pub fn new<S>(stream: S, pipeline: Pipeline<C>, draining: CancellationToken) -> Self
    where
        S: ConnectionStream,
    {
        let parts = pipeline.into_parts();
        let stream: BoxedStream = Box::new(stream);
        let observed = ObservedStream::new(parts.id, parts.diagnostics, stream);
        let (read_half, write_half) = split(observed);
        Self {
            id: parts.id,
            stages: parts.stages,
            reader: FramedRead::new(read_half, parts.decoder),
            writer: FramedWrite::new(write_half, parts.encoder),
            draining,
        }
    }

    /// Identifier of this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Ordered stage chain installed on this connection.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] { &self.stages }

    /// Wait for the next complete frame.
    ///
    /// Returns `None` once the peer has closed the connection at a frame
    /// boundary.
    pub async fn next_frame(&mut self) -> Option<io::Result<C::Frame>> {
        let next = self.reader.next().await;
        if let Some(Ok(_)) = next {
            crate::metrics::inc_frames_decoded();
        }
        next
    }

    /// Encode and flush a frame to the peer.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    pub async fn send(&mut self, frame: C::Frame) -> io::Result<()> {
        self.writer.send(frame).await
    }

    /// Returns `true` once the server has begun draining.
    #[must_use]
    pub fn is_draining(&self) -> bool { self.draining.is_cancelled() }

    /// Resolve when the server begins draining.
    pub async fn draining(&self) { self.draining.cancelled().await; }

    /// Read and discard frames until the peer closes the connection.
    ///
    /// Used when no handler is configured.
    ///
    /// # Errors
    /// Returns the first transport or framing error.
    pub async fn discard_frames(&mut self) -> io::Result<()> {
        while let Some(frame) = self.next_frame().await {
            let frame = frame?;
            tracing::trace!(
                connection = %self.id,
                len = C::frame_payload(&frame).len(),
                "no handler configured; frame dropped"
            );
        }
        Ok(())
    }
}

impl<C: FrameCodec> fmt::Debug for FramedConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedConnection")
            .field("id", &self.id)
            .field("stages", &self.stages)
            .field("draining", &self.is_draining())
            .finish_non_exhaustive()
    }
}
