//! Error types for the framing layer.
//!
//! Decoders surface failures as [`io::Error`] so they slot into
//! `tokio_util` codecs. [`CodecError`] is the structured form carried inside
//! those errors; [`CodecError::from_io`] recovers it for logging.
//!
//! - [`FramingError`]: wire-level issues in the frame header.
//! - [`EofError`]: the peer closed the stream part-way through a frame.

use std::io;

use thiserror::Error;

/// Framing-level errors occurring during frame boundary detection.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Length prefix declares a payload above the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Payload size declared by the header or supplied for encoding.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },
}

/// Premature end-of-stream conditions.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The stream ended while the frame header was being read.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },

    /// The stream ended after the header but before the full payload.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Payload bytes received before EOF.
        bytes_received: usize,
        /// Payload size declared by the header.
        expected: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use plugin_runner::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::OversizedFrame {
///     size: 2000,
///     max: 1024,
/// });
/// let io_err: std::io::Error = err.into();
/// assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidData);
/// assert_eq!(
///     CodecError::from_io(&io_err).map(CodecError::error_type),
///     Some("framing")
/// );
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Eof(_) => "eof",
        }
    }

    /// Recover the structured error wrapped in an [`io::Error`], if any.
    #[must_use]
    pub fn from_io(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        let kind = match err {
            CodecError::Framing(_) => io::ErrorKind::InvalidData,
            CodecError::Eof(_) => io::ErrorKind::UnexpectedEof,
        };
        io::Error::new(kind, err)
    }
}
