//! Unix domain socket listener for the plugin runner.
//!
//! [`RunnerServer`] binds the socket, installs a fresh pipeline on every
//! accepted connection and hands each connection to the configured
//! [`RequestHandler`]. Starting a bound server yields a [`ServerHandle`] that
//! drives the `Listening → Draining → Closed` lifecycle with a bounded
//! shutdown deadline.

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use crate::{codec::FrameCodec, handler::RequestHandler, pipeline::PipelineFactory};

mod artifact;
mod binding;
mod config;
mod connection_spawner;
pub mod error;
mod handle;
mod lifecycle;
mod runtime;
mod signal;

pub use artifact::SocketArtifact;
pub use error::ServerError;
pub use handle::ServerHandle;
pub use lifecycle::LifecycleState;
pub use runtime::BackoffConfig;
pub use signal::shutdown_signal;

use self::lifecycle::Lifecycle;

/// Shutdown deadline applied when none is configured.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(45);

/// Listener serving runner connections over a Unix domain socket.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (state [`LifecycleState::Created`]) or [`Bound`] (state
/// [`LifecycleState::Listening`]). Only bound servers can be started, and a
/// server is never rebound.
pub struct RunnerServer<C, S = Unbound>
where
    C: FrameCodec,
    S: ServerState,
{
    pub(crate) pipeline: PipelineFactory<C>,
    pub(crate) handler: Option<Arc<dyn RequestHandler<C>>>,
    /// Channel used to notify when the server is accepting connections.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so
    /// a new sender must be supplied for each server.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) backoff_config: BackoffConfig,
    pub(crate) shutdown_deadline: Duration,
    pub(crate) socket_mode: Option<u32>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) state: S,
}

impl<C, S> std::fmt::Debug for RunnerServer<C, S>
where
    C: FrameCodec,
    S: ServerState + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerServer")
            .field("pipeline", &self.pipeline)
            .field("has_handler", &self.handler.is_some())
            .field("backoff_config", &self.backoff_config)
            .field("shutdown_deadline", &self.shutdown_deadline)
            .field("socket_mode", &self.socket_mode)
            .field("lifecycle", &self.lifecycle)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Marker indicating the server has not yet bound its socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker holding the bound listener and the socket file it created.
#[derive(Debug)]
pub struct Bound {
    pub(crate) listener: tokio::net::UnixListener,
    pub(crate) artifact: Arc<SocketArtifact>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl<C, S> RunnerServer<C, S>
where
    C: FrameCodec,
    S: ServerState,
{
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState { self.lifecycle.current() }
}

#[cfg(test)]
pub(crate) mod test_util;
