//! Pluggable framing codecs.
//!
//! A codec splits a connection's byte stream into frames and wraps outgoing
//! frames for transmission. Each connection receives its own decoder and
//! encoder from [`FrameCodec::decoder`] and [`FrameCodec::encoder`], so any
//! partially received frame stays buffered with the connection that owns it.
//!
//! [`RunnerFrameCodec`] implements the gateway's plugin-runner framing: one
//! type byte followed by a 3-byte big-endian payload length.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::byte_order::{MAX_U24, read_network_u24, write_network_u24};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Size of the runner frame header: one type byte and a 24-bit length.
pub const HEADER_SIZE: usize = 4;

/// Largest payload the 24-bit length field can describe.
pub const MAX_FRAME_LENGTH: usize = MAX_U24 as usize;

/// Trait for pluggable frame codecs supporting different wire protocols.
///
/// Implementors define their own `Frame` type and provide decoder/encoder
/// instances. Decoders must return `Ok(None)` without consuming input when a
/// frame is incomplete.
pub trait FrameCodec: Send + Sync + Clone + 'static {
    /// Frame type produced by decoding.
    type Frame: Send + Sync + 'static;
    /// Decoder type for this codec.
    type Decoder: Decoder<Item = Self::Frame, Error = io::Error> + Send + 'static;
    /// Encoder type for this codec.
    type Encoder: Encoder<Self::Frame, Error = io::Error> + Send + 'static;

    /// Create a Tokio decoder for this codec.
    fn decoder(&self) -> Self::Decoder;

    /// Create a Tokio encoder for this codec.
    fn encoder(&self) -> Self::Encoder;

    /// Extract the payload bytes from a frame.
    fn frame_payload(frame: &Self::Frame) -> &[u8];

    /// Maximum payload length this codec will accept.
    fn max_frame_length(&self) -> usize;
}

/// One runner protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerFrame {
    /// Message type identifier.
    pub kind: u8,
    /// Message body.
    pub payload: Bytes,
}

impl RunnerFrame {
    /// Create a frame of the given type.
    #[must_use]
    pub fn new(kind: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Encoded size of the frame including its header.
    #[must_use]
    pub fn wire_len(&self) -> usize { HEADER_SIZE + self.payload.len() }
}

/// Codec for runner frames.
///
/// ```text
/// +--------+------------------------+-----------------+
/// | type:1 | length:3 (big-endian)  | payload:length  |
/// +--------+------------------------+-----------------+
/// ```
#[derive(Clone, Debug)]
pub struct RunnerFrameCodec {
    max_frame_length: usize,
}

impl RunnerFrameCodec {
    /// Construct a codec with a maximum payload length.
    ///
    /// Values above [`MAX_FRAME_LENGTH`] are clamped, since the header cannot
    /// describe larger payloads.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.min(MAX_FRAME_LENGTH),
        }
    }
}

impl Default for RunnerFrameCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

/// Decoder half of [`RunnerFrameCodec`].
#[derive(Debug)]
pub struct RunnerFrameDecoder {
    max_frame_length: usize,
}

impl RunnerFrameDecoder {
    fn peek_header(src: &BytesMut) -> Option<(u8, usize)> {
        let header = src.get(..HEADER_SIZE)?;
        let (&kind, len) = header.split_first()?;
        let len = <[u8; 3]>::try_from(len).ok()?;
        Some((kind, read_network_u24(len) as usize))
    }
}

impl Decoder for RunnerFrameDecoder {
    type Item = RunnerFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some((kind, len)) = Self::peek_header(src) else {
            return Ok(None);
        };
        if len > self.max_frame_length {
            return Err(CodecError::Framing(FramingError::OversizedFrame {
                size: len,
                max: self.max_frame_length,
            })
            .into());
        }
        let total = HEADER_SIZE + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(HEADER_SIZE);
        let payload = src.split_to(len).freeze();
        Ok(Some(RunnerFrame { kind, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => Err(build_eof_error(src)),
        }
    }
}

/// Build the EOF error describing how much of the frame arrived.
fn build_eof_error(src: &BytesMut) -> io::Error {
    let err = match RunnerFrameDecoder::peek_header(src) {
        Some((_, expected)) => EofError::MidFrame {
            bytes_received: src.len().saturating_sub(HEADER_SIZE),
            expected,
        },
        None => EofError::MidHeader {
            bytes_received: src.len(),
            header_size: HEADER_SIZE,
        },
    };
    CodecError::Eof(err).into()
}

/// Encoder half of [`RunnerFrameCodec`].
#[derive(Debug)]
pub struct RunnerFrameEncoder {
    max_frame_length: usize,
}

impl Encoder<RunnerFrame> for RunnerFrameEncoder {
    type Error = io::Error;

    fn encode(&mut self, item: RunnerFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.payload.len();
        if len > self.max_frame_length {
            return Err(CodecError::Framing(FramingError::OversizedFrame {
                size: len,
                max: self.max_frame_length,
            })
            .into());
        }
        let len = u32::try_from(len).map_err(|_| {
            io::Error::from(CodecError::Framing(FramingError::OversizedFrame {
                size: len,
                max: self.max_frame_length,
            }))
        })?;
        dst.reserve(item.wire_len());
        dst.put_u8(item.kind);
        dst.put_slice(&write_network_u24(len));
        dst.put_slice(&item.payload);
        Ok(())
    }
}

impl FrameCodec for RunnerFrameCodec {
    type Frame = RunnerFrame;
    type Decoder = RunnerFrameDecoder;
    type Encoder = RunnerFrameEncoder;

    fn decoder(&self) -> Self::Decoder {
        RunnerFrameDecoder {
            max_frame_length: self.max_frame_length,
        }
    }

    fn encoder(&self) -> Self::Encoder {
        RunnerFrameEncoder {
            max_frame_length: self.max_frame_length,
        }
    }

    fn frame_payload(frame: &Self::Frame) -> &[u8] { &frame.payload }

    fn max_frame_length(&self) -> usize { self.max_frame_length }
}
