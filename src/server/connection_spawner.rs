//! Connection task spawning for [`RunnerServer`](super::RunnerServer).

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::FutureExt;
use log::{debug, error, warn};
use tokio::select;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    codec::{FrameCodec, error::CodecError},
    connection::{ConnectionId, ConnectionStream, FramedConnection},
    handler::RequestHandler,
    pipeline::PipelineFactory,
};

/// What every connection is built from.
pub(super) struct ConnectionSetup<C: FrameCodec> {
    pub pipeline: PipelineFactory<C>,
    pub handler: Option<Arc<dyn RequestHandler<C>>>,
}

/// Server-wide state a connection task runs within.
#[derive(Clone, Debug)]
pub(super) struct ConnectionScope {
    pub tracker: TaskTracker,
    /// Cancelled when the server begins draining.
    pub draining: CancellationToken,
    /// Cancelled when the shutdown deadline elapses.
    pub abort: CancellationToken,
    pub active: Arc<AtomicUsize>,
}

/// RAII guard counting a connection as active while it is served.
struct ActiveConnection {
    active: Arc<AtomicUsize>,
}

impl ActiveConnection {
    fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        crate::metrics::inc_connections();
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        crate::metrics::dec_connections();
    }
}

/// Install a fresh pipeline on `stream` and serve it on a tracked task.
///
/// Panics are caught and logged; they close only this connection. The task
/// drops the connection as soon as `scope.abort` is cancelled.
pub(super) fn spawn_connection_task<C, S>(
    stream: S,
    id: ConnectionId,
    setup: &ConnectionSetup<C>,
    scope: &ConnectionScope,
) where
    C: FrameCodec,
    S: ConnectionStream,
{
    let mut pipeline = setup.pipeline.initialize(id);
    if let Some(handler) = &setup.handler
        && let Err(e) = pipeline.attach_handler(handler.name())
    {
        error!("connection rejected: invalid pipeline: error={e}, connection={id}");
        return;
    }
    let guard = ActiveConnection::new(&scope.active);
    let conn = FramedConnection::new(stream, pipeline, scope.draining.clone());
    let handler = setup.handler.clone();
    let abort = scope.abort.clone();

    scope.tracker.spawn(async move {
        let _guard = guard;
        let serve = std::panic::AssertUnwindSafe(serve(conn, handler)).catch_unwind();
        select! {
            biased;

            () = abort.cancelled() => {
                warn!("connection force-closed at shutdown deadline: connection={id}");
            }
            res = serve => {
                if let Err(panic) = res {
                    crate::metrics::inc_connection_panics();
                    let panic_msg = crate::panic::panic_message(&*panic);
                    error!("connection task panicked: panic={panic_msg}, connection={id}");
                }
            }
        }
    });
}

async fn serve<C: FrameCodec>(
    mut conn: FramedConnection<C>,
    handler: Option<Arc<dyn RequestHandler<C>>>,
) {
    let id = conn.id();
    let result = match handler {
        Some(handler) => handler.handle(&mut conn).await,
        None => conn.discard_frames().await,
    };
    match result {
        Ok(()) => debug!("connection finished: connection={id}"),
        Err(e) => report_error(id, &e),
    }
}

fn report_error(id: ConnectionId, err: &io::Error) {
    let kind = CodecError::from_io(err).map_or("io", CodecError::error_type);
    crate::metrics::inc_errors(kind);
    warn!("connection task error: error={err}, kind={kind}, connection={id}");
}
