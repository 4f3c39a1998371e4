//! Control surface of a started server.
//!
//! A [`ServerHandle`] is the only way to move a running server through
//! `Listening → Draining → Closed`. Disposal is requested at most once;
//! duplicate requests are absorbed. Draining waits for open connections up
//! to the shutdown deadline, then force-closes whatever is left and waits for
//! those tasks to unwind before removing the socket file and publishing
//! `Closed`.

use std::{
    future::Future,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{runtime::Handle, select, sync::watch, task::JoinHandle, time::timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{LifecycleState, SocketArtifact, lifecycle::Lifecycle};

/// How long force-closed connection tasks get to unwind after the deadline.
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// Cloneable handle to a started [`RunnerServer`](super::RunnerServer).
#[derive(Clone, Debug)]
pub struct ServerHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
pub(super) struct HandleInner {
    lifecycle: Lifecycle,
    artifact: Arc<SocketArtifact>,
    deadline: Duration,
    pub(super) tracker: TaskTracker,
    /// Cancelled when draining begins: stops accepting and tells handlers.
    pub(super) draining: CancellationToken,
    /// Cancelled when the deadline elapses: force-closes connections.
    pub(super) abort: CancellationToken,
    pub(super) active: Arc<AtomicUsize>,
    runtime: Handle,
}

impl ServerHandle {
    /// Must be called from within a Tokio runtime; disposal tasks are
    /// spawned onto it.
    pub(super) fn new(
        lifecycle: Lifecycle,
        artifact: Arc<SocketArtifact>,
        deadline: Duration,
    ) -> Self {
        debug_assert_eq!(lifecycle.current(), LifecycleState::Listening);
        Self {
            inner: Arc::new(HandleInner {
                lifecycle,
                artifact,
                deadline,
                tracker: TaskTracker::new(),
                draining: CancellationToken::new(),
                abort: CancellationToken::new(),
                active: Arc::new(AtomicUsize::new(0)),
                runtime: Handle::current(),
            }),
        }
    }

    pub(super) fn inner(&self) -> &HandleInner { &self.inner }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState { self.inner.lifecycle.current() }

    /// Subscribe to lifecycle transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.lifecycle.subscribe()
    }

    /// Path of the socket file owned by the server.
    #[must_use]
    pub fn socket_path(&self) -> &Path { self.inner.artifact.path() }

    /// Shutdown deadline applied by disposal.
    #[must_use]
    pub fn deadline(&self) -> Duration { self.inner.deadline }

    /// Number of connections currently being served.
    #[must_use]
    pub fn active_connection_count(&self) -> usize { self.inner.active.load(Ordering::Acquire) }

    /// Begin disposal if the server is still listening.
    ///
    /// Returns `true` if this call started draining and `false` if disposal
    /// was already underway or finished. Never blocks.
    pub fn request_dispose(&self) -> bool {
        if !self
            .inner
            .lifecycle
            .advance(LifecycleState::Listening, LifecycleState::Draining)
        {
            debug!("dispose already requested: state={:?}", self.state());
            return false;
        }
        info!(
            "plugin runner draining: socket={}, deadline={:?}, active_connections={}",
            self.socket_path().display(),
            self.inner.deadline,
            self.active_connection_count()
        );
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move { inner.drain().await });
        true
    }

    /// Request disposal and wait until the server is closed.
    pub async fn dispose(&self) {
        self.request_dispose();
        self.closed().await;
    }

    /// Wait until the server reaches [`LifecycleState::Closed`].
    ///
    /// This is the wait that keeps a runner process alive; it resolves only
    /// through disposal.
    pub async fn closed(&self) {
        let mut rx = self.inner.lifecycle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|state| *state == LifecycleState::Closed).await;
    }

    /// Register `trigger` as the shutdown hook.
    ///
    /// When `trigger` resolves, disposal is requested once. The hook task
    /// ends quietly if the server closes first.
    pub fn dispose_on<F>(&self, trigger: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.clone();
        self.inner.runtime.spawn(async move {
            select! {
                () = trigger => {
                    handle.request_dispose();
                }
                () = handle.closed() => {}
            }
        })
    }
}

impl HandleInner {
    async fn drain(&self) {
        self.draining.cancel();
        self.tracker.close();
        if timeout(self.deadline, self.tracker.wait()).await.is_err() {
            warn!(
                "shutdown deadline elapsed, forcing connections closed: deadline={:?}, \
                 active_connections={}",
                self.deadline,
                self.active.load(Ordering::Acquire)
            );
            self.abort.cancel();
            if timeout(ABORT_GRACE, self.tracker.wait()).await.is_err() {
                warn!(
                    "connection tasks still running after force-close: active_connections={}",
                    self.active.load(Ordering::Acquire)
                );
            }
        }
        self.artifact.remove();
        let closed = self
            .lifecycle
            .advance(LifecycleState::Draining, LifecycleState::Closed);
        debug_assert!(closed, "only the drain task publishes Closed");
        info!("plugin runner closed: socket={}", self.artifact.path().display());
    }
}
