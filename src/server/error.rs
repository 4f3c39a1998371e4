//! Errors raised while starting a [`RunnerServer`](super::RunnerServer).
//!
//! All variants are startup failures. Once the server is listening, errors
//! stay local to the connection that produced them.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::address::AddressError;

/// Errors that prevent the server from reaching `Listening`.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured socket location is invalid.
    #[error("invalid socket address: {0}")]
    Address(#[from] AddressError),

    /// Binding the socket failed (address in use, permission denied, path
    /// too long).
    #[error("failed to bind socket at {}: {source}", path.display())]
    Bind {
        /// Socket path that could not be bound.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The socket was bound but could not be prepared for serving.
    #[error("failed to configure socket at {}: {source}", path.display())]
    Configure {
        /// Socket path being configured.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}
