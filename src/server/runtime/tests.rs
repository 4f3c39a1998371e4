//! Tests for server runtime behaviour.

use std::{
    io,
    sync::{Arc, Mutex, atomic::AtomicUsize},
};

use async_trait::async_trait;
use rstest::rstest;
use tempfile::TempDir;
use tokio::{
    io::AsyncReadExt,
    net::{UnixListener, UnixStream},
    sync::oneshot,
    task::yield_now,
    time::{Duration, Instant, advance, sleep, timeout},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{AcceptLoopOptions, BackoffConfig, MockAcceptListener, RunnerServer, accept_loop};
use crate::{
    codec::RunnerFrameCodec,
    connection::FramedConnection,
    handler::RequestHandler,
    pipeline::PipelineFactory,
    server::{
        LifecycleState,
        ServerHandle,
        SocketArtifact,
        connection_spawner::{ConnectionScope, ConnectionSetup},
        test_util::{bind_server, socket_address, socket_dir},
    },
};

/// Holds the connection open until the server begins draining.
struct UntilDraining;

#[async_trait]
impl RequestHandler<RunnerFrameCodec> for UntilDraining {
    async fn handle(&self, conn: &mut FramedConnection<RunnerFrameCodec>) -> io::Result<()> {
        conn.draining().await;
        Ok(())
    }
}

/// Never finishes on its own.
struct Stall;

#[async_trait]
impl RequestHandler<RunnerFrameCodec> for Stall {
    async fn handle(&self, _conn: &mut FramedConnection<RunnerFrameCodec>) -> io::Result<()> {
        std::future::pending().await
    }
}

fn scope() -> ConnectionScope {
    ConnectionScope {
        tracker: TaskTracker::new(),
        draining: CancellationToken::new(),
        abort: CancellationToken::new(),
        active: Arc::new(AtomicUsize::new(0)),
    }
}

fn options(
    scope: ConnectionScope,
    backoff: BackoffConfig,
    dir: &TempDir,
) -> AcceptLoopOptions<RunnerFrameCodec> {
    AcceptLoopOptions {
        setup: ConnectionSetup {
            pipeline: PipelineFactory::new(RunnerFrameCodec::default()),
            handler: None,
        },
        scope,
        backoff,
        artifact: Arc::new(SocketArtifact::new(dir.path().join("unused.sock"))),
    }
}

async fn wait_for_active(handle: &ServerHandle, expected: usize) {
    timeout(Duration::from_secs(1), async {
        while handle.active_connection_count() != expected {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("connection count reached");
}

#[rstest]
#[tokio::test]
async fn run_with_immediate_shutdown(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let server = bind_server(&address);
    let shutdown = async { sleep(Duration::from_millis(10)).await };
    timeout(Duration::from_secs(1), server.run_with_shutdown(shutdown))
        .await
        .expect("server did not finish in time");
    assert!(!address.path().exists(), "socket file removed once closed");
}

#[rstest]
#[tokio::test]
async fn ready_signal_fires_on_start(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let (tx, rx) = oneshot::channel();
    let handle = RunnerServer::new(RunnerFrameCodec::default())
        .ready_signal(tx)
        .bind(&address)
        .expect("bind")
        .start();
    timeout(Duration::from_secs(1), rx)
        .await
        .expect("ready in time")
        .expect("ready signal sent");
    UnixStream::connect(address.path()).await.expect("connect");
    handle.dispose().await;
}

#[rstest]
#[tokio::test]
async fn dispose_is_idempotent(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let handle = bind_server(&address).start();
    let mut states = handle.watch_state();
    assert_eq!(*states.borrow_and_update(), LifecycleState::Listening);

    assert!(handle.request_dispose());
    assert!(!handle.request_dispose());
    assert_eq!(handle.state(), LifecycleState::Draining);

    timeout(Duration::from_secs(1), handle.closed())
        .await
        .expect("closed in time");
    assert_eq!(handle.state(), LifecycleState::Closed);
    assert!(!handle.request_dispose());
    handle.dispose().await;

    assert!(!address.path().exists());
    let err = UnixStream::connect(address.path())
        .await
        .expect_err("no listener after close");
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[rstest]
#[tokio::test]
async fn concurrent_dispose_requests_start_one_drain(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let handle = bind_server(&address).start();
    let requests: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.request_dispose() })
        })
        .collect();
    let mut started = 0;
    for request in requests {
        if request.await.expect("join dispose request") {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    handle.closed().await;
}

#[rstest]
#[tokio::test]
async fn draining_connections_finish_before_deadline(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let handle = RunnerServer::new(RunnerFrameCodec::default())
        .with_handler(UntilDraining)
        .shutdown_deadline(Duration::from_secs(30))
        .bind(&address)
        .expect("bind")
        .start();
    let _client = UnixStream::connect(address.path()).await.expect("connect");
    wait_for_active(&handle, 1).await;

    timeout(Duration::from_secs(1), handle.dispose())
        .await
        .expect("drained well before the deadline");
    assert_eq!(handle.active_connection_count(), 0);
}

#[rstest]
#[tokio::test]
async fn deadline_force_closes_stalled_connections(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let deadline = Duration::from_millis(100);
    let handle = RunnerServer::new(RunnerFrameCodec::default())
        .with_handler(Stall)
        .shutdown_deadline(deadline)
        .bind(&address)
        .expect("bind")
        .start();
    let mut client = UnixStream::connect(address.path()).await.expect("connect");
    wait_for_active(&handle, 1).await;

    let started = Instant::now();
    timeout(Duration::from_secs(2), handle.dispose())
        .await
        .expect("closed within a bounded time");
    assert!(started.elapsed() >= deadline);
    assert_eq!(handle.state(), LifecycleState::Closed);
    assert_eq!(handle.active_connection_count(), 0);

    let mut buf = [0_u8; 1];
    let read = client.read(&mut buf).await.expect("read after close");
    assert_eq!(read, 0, "peer sees the connection closed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn forced_connections_are_gone_once_closed(socket_dir: TempDir) {
    for round in 0..20 {
        let address = socket_address(&socket_dir);
        let handle = RunnerServer::new(RunnerFrameCodec::default())
            .with_handler(Stall)
            .shutdown_deadline(Duration::from_millis(5))
            .bind(&address)
            .expect("bind")
            .start();
        let mut clients = Vec::new();
        for _ in 0..8 {
            clients.push(UnixStream::connect(address.path()).await.expect("connect"));
        }
        wait_for_active(&handle, 8).await;

        timeout(Duration::from_secs(2), handle.dispose())
            .await
            .expect("closed within a bounded time");
        assert_eq!(
            handle.active_connection_count(),
            0,
            "round {round}: connections outlived Closed"
        );
    }
}

#[rstest]
#[tokio::test]
async fn dispose_on_trigger(socket_dir: TempDir) {
    let address = socket_address(&socket_dir);
    let handle = bind_server(&address).start();
    let (tx, rx) = oneshot::channel::<()>();
    let hook = handle.dispose_on(async {
        let _ = rx.await;
    });
    assert_eq!(handle.state(), LifecycleState::Listening);
    let _ = tx.send(());
    timeout(Duration::from_secs(1), handle.closed())
        .await
        .expect("closed after trigger");
    hook.await.expect("hook task finished");
}

#[rstest]
#[tokio::test]
async fn accept_loop_stops_when_draining(socket_dir: TempDir) {
    let scope = scope();
    let listener =
        UnixListener::bind(socket_dir.path().join("loop.sock")).expect("bind test listener");
    scope.tracker.spawn(accept_loop(
        listener,
        options(scope.clone(), BackoffConfig::default(), &socket_dir),
    ));

    scope.draining.cancel();
    scope.tracker.close();
    let result = timeout(Duration::from_millis(100), scope.tracker.wait()).await;
    assert!(result.is_ok());
}

/// Creates a mock listener whose accepts always fail, recording call times.
fn setup_backoff_mock_listener(
    calls: &Arc<Mutex<Vec<Instant>>>,
    num_calls: usize,
) -> MockAcceptListener {
    let mut listener = MockAcceptListener::new();
    let call_log = Arc::clone(calls);
    listener
        .expect_accept()
        .returning(move || {
            let call_log = Arc::clone(&call_log);
            Box::pin(async move {
                call_log.lock().expect("lock").push(Instant::now());
                Err(io::Error::other("mock error"))
            })
        })
        .times(num_calls);
    listener
        .expect_local_path()
        .returning(|| None)
        .times(num_calls);
    listener
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn accept_loop_backs_off_exponentially(socket_dir: TempDir) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let listener = setup_backoff_mock_listener(&calls, 4);
    let scope = scope();
    let backoff = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    };
    scope
        .tracker
        .spawn(accept_loop(listener, options(scope.clone(), backoff, &socket_dir)));

    yield_now().await;
    assert_eq!(calls.lock().expect("lock").len(), 1);

    for ms in [5, 10, 20] {
        advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    scope.draining.cancel();
    scope.tracker.close();
    scope.tracker.wait().await;

    let calls = calls.lock().expect("lock");
    let intervals: Vec<Duration> = calls
        .windows(2)
        .filter_map(|pair| match pair {
            [a, b] => Some(b.duration_since(*a)),
            _ => None,
        })
        .collect();
    assert_eq!(
        intervals,
        [5, 10, 20].map(Duration::from_millis).to_vec()
    );
}
