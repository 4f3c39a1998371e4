//! Bind address resolution for the runner listener.
//!
//! The gateway hands the runner a socket location such as
//! `unix:/tmp/runner.sock`. Resolution strips the `unix:` scheme and treats
//! the remainder as the filesystem path of a Unix domain socket. The resolver
//! never touches the filesystem; collisions surface at bind time.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::warn;
use thiserror::Error;

/// Scheme prefix accepted in front of a socket path.
pub const UNIX_SCHEME: &str = "unix:";

/// Errors raised while resolving a configured bind path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The path was empty once the scheme prefix was removed.
    #[error("socket path is empty (configured value: {configured:?})")]
    Empty {
        /// Value exactly as it was configured.
        configured: String,
    },
}

/// Listener configuration supplied by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Socket location, optionally prefixed with `unix:`.
    pub path: String,
}

impl ListenerConfig {
    /// Create a configuration for the given socket location.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self { Self { path: path.into() } }

    /// Resolve the configured location into a [`LocalAddress`].
    ///
    /// # Errors
    /// Returns [`AddressError::Empty`] if no path remains after stripping the
    /// scheme prefix.
    pub fn resolve(&self) -> Result<LocalAddress, AddressError> { resolve(&self.path) }
}

/// Filesystem address of a Unix domain socket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalAddress {
    path: PathBuf,
}

impl LocalAddress {
    /// Filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

impl fmt::Display for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolve a configured socket location into a [`LocalAddress`].
///
/// A leading `unix:` is removed once. Other schemes are not recognised and
/// the value is used verbatim as a path.
///
/// # Examples
///
/// ```
/// use plugin_runner::address::resolve;
///
/// let addr = resolve("unix:/tmp/runner.sock").expect("valid path");
/// assert_eq!(addr.path(), std::path::Path::new("/tmp/runner.sock"));
/// assert!(resolve("unix:").is_err());
/// ```
///
/// # Errors
/// Returns [`AddressError::Empty`] if the path is empty after stripping.
pub fn resolve(configured: &str) -> Result<LocalAddress, AddressError> {
    let path = configured.strip_prefix(UNIX_SCHEME).unwrap_or(configured);
    if path.is_empty() {
        return Err(AddressError::Empty {
            configured: configured.to_owned(),
        });
    }
    if let Some(scheme) = foreign_scheme(path) {
        warn!("unrecognised socket scheme treated as a raw path: scheme={scheme}, path={path}");
    }
    Ok(LocalAddress {
        path: PathBuf::from(path),
    })
}

/// Detect a `scheme:` prefix other than `unix:`.
///
/// Only alphabetic schemes directly followed by a colon count, so relative
/// paths such as `./a:b` are not reported.
fn foreign_scheme(path: &str) -> Option<&str> {
    let (scheme, _) = path.split_once(':')?;
    (!scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic())).then_some(scheme)
}
