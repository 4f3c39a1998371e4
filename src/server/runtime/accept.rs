//! Accept loop feeding connections to the spawner.

use std::{io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{UnixListener, UnixStream},
    select,
    time::{Duration, sleep},
};

use super::backoff::BackoffConfig;
use crate::{
    codec::FrameCodec,
    connection::ConnectionId,
    server::{
        SocketArtifact,
        connection_spawner::{ConnectionScope, ConnectionSetup, spawn_connection_task},
    },
};

/// Source of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<UnixStream>;
    fn local_path(&self) -> Option<PathBuf>;
}

#[async_trait]
impl AcceptListener for UnixListener {
    async fn accept(&self) -> io::Result<UnixStream> {
        UnixListener::accept(self).await.map(|(stream, _)| stream)
    }

    fn local_path(&self) -> Option<PathBuf> {
        UnixListener::local_addr(self)
            .ok()
            .and_then(|addr| addr.as_pathname().map(PathBuf::from))
    }
}

pub(in crate::server) struct AcceptLoopOptions<C: FrameCodec> {
    pub setup: ConnectionSetup<C>,
    pub scope: ConnectionScope,
    pub backoff: BackoffConfig,
    /// Keeps the socket file alive for as long as the loop runs.
    pub artifact: Arc<SocketArtifact>,
}

/// Accept connections until draining begins.
///
/// Each accepted stream gets the next [`ConnectionId`] and is handed to
/// [`spawn_connection_task`]. Accept failures are logged and retried after
/// an exponential back-off; they never stop the loop.
pub(in crate::server) async fn accept_loop<C, L>(listener: L, options: AcceptLoopOptions<C>)
where
    C: FrameCodec,
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        setup,
        scope,
        backoff,
        artifact: _artifact,
    } = options;
    let backoff = backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;
    let mut next_id = 0_u64;
    while let Some(next_delay) =
        accept_iteration(&listener, &setup, &scope, &backoff, delay, &mut next_id).await
    {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<C, L>(
    listener: &L,
    setup: &ConnectionSetup<C>,
    scope: &ConnectionScope,
    backoff: &BackoffConfig,
    delay: Duration,
    next_id: &mut u64,
) -> Option<Duration>
where
    C: FrameCodec,
    L: AcceptListener,
{
    select! {
        biased;

        () = scope.draining.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok(stream) => {
                let id = ConnectionId::new(*next_id);
                *next_id = next_id.wrapping_add(1);
                spawn_connection_task(stream, id, setup, scope);
                backoff.initial_delay
            }
            Err(e) => {
                let local_path = listener.local_path();
                warn!("accept error: error={e:?}, local_path={local_path:?}");
                crate::metrics::inc_errors("accept");
                select! {
                    biased;

                    () = scope.draining.cancelled() => return None,
                    () = sleep(delay) => {}
                }
                backoff.next_delay(delay)
            }
        }),
    }
}
