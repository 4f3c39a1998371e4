//! Runtime control for [`RunnerServer`].

mod accept;
mod backoff;
#[cfg(test)]
mod tests;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;

use super::{
    Bound,
    RunnerServer,
    ServerHandle,
    connection_spawner::{ConnectionScope, ConnectionSetup},
    shutdown_signal,
};
use crate::codec::FrameCodec;

impl<C: FrameCodec> RunnerServer<C, Bound> {
    /// Start accepting connections and return the handle controlling the
    /// server.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use plugin_runner::{address::resolve, codec::RunnerFrameCodec, server::RunnerServer};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let address = resolve("unix:/tmp/runner.sock")?;
    /// let handle = RunnerServer::new(RunnerFrameCodec::default())
    ///     .bind(&address)?
    ///     .start();
    /// handle.dispose().await;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Starting a server that has not been bound fails to compile:
    ///
    /// ```compile_fail
    /// use plugin_runner::{codec::RunnerFrameCodec, server::RunnerServer};
    ///
    /// fn try_start() {
    ///     let _ = RunnerServer::new(RunnerFrameCodec::default()).start();
    /// }
    /// ```
    #[must_use = "dropping the handle leaves no way to dispose the server"]
    pub fn start(self) -> ServerHandle {
        let RunnerServer {
            pipeline,
            handler,
            ready_tx,
            backoff_config,
            shutdown_deadline,
            lifecycle,
            state: Bound { listener, artifact },
            ..
        } = self;

        let handle = ServerHandle::new(lifecycle, Arc::clone(&artifact), shutdown_deadline);
        let inner = handle.inner();
        let scope = ConnectionScope {
            tracker: inner.tracker.clone(),
            draining: inner.draining.clone(),
            abort: inner.abort.clone(),
            active: Arc::clone(&inner.active),
        };
        inner.tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                setup: ConnectionSetup { pipeline, handler },
                scope,
                backoff: backoff_config,
                artifact,
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }
        handle
    }

    /// Serve until `SIGINT` or `SIGTERM`, then dispose.
    ///
    /// Returns once the server is closed.
    pub async fn run(self) { self.run_with_shutdown(shutdown_signal()).await; }

    /// Serve until `shutdown` resolves, then dispose.
    ///
    /// Returns once the server is closed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use plugin_runner::{address::resolve, codec::RunnerFrameCodec, server::RunnerServer};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = RunnerServer::new(RunnerFrameCodec::default())
    ///     .bind(&resolve("unix:/tmp/runner.sock")?)?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let task = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    /// let _ = tx.send(());
    /// task.await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_with_shutdown<S>(self, shutdown: S)
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let handle = self.start();
        let _hook = handle.dispose_on(shutdown);
        handle.closed().await;
    }
}
