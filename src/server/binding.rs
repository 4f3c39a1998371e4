//! Socket binding for [`RunnerServer`].

use std::{
    os::unix::{fs::PermissionsExt, net::UnixListener as StdUnixListener},
    path::Path,
    sync::Arc,
};

use log::info;
use tokio::net::UnixListener;

use super::{Bound, LifecycleState, RunnerServer, ServerError, SocketArtifact, Unbound};
use crate::{
    address::{ListenerConfig, LocalAddress},
    codec::FrameCodec,
};

impl<C: FrameCodec> RunnerServer<C, Unbound> {
    /// Bind the socket at `address`, moving the server to `Listening`.
    ///
    /// Must be called from within a Tokio runtime. A file already present at
    /// the path is left untouched and the bind fails.
    ///
    /// # Errors
    /// Returns [`ServerError::Bind`] if the socket cannot be bound and
    /// [`ServerError::Configure`] if it cannot be prepared for serving.
    pub fn bind(self, address: &LocalAddress) -> Result<RunnerServer<C, Bound>, ServerError> {
        let path = address.path();
        let std_listener = StdUnixListener::bind(path).map_err(|source| ServerError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        // From here on the file is ours; any failure below unlinks it.
        let artifact = Arc::new(SocketArtifact::new(path.to_path_buf()));
        let listener = self.prepare_listener(path, std_listener)?;
        Ok(self.into_bound(listener, artifact))
    }

    /// Resolve `config` and bind the resulting address.
    ///
    /// # Errors
    /// Returns [`ServerError::Address`] for an invalid path, otherwise the
    /// errors of [`bind`](Self::bind).
    pub fn bind_config(
        self,
        config: &ListenerConfig,
    ) -> Result<RunnerServer<C, Bound>, ServerError> {
        let address = config.resolve()?;
        self.bind(&address)
    }

    fn prepare_listener(
        &self,
        path: &Path,
        std_listener: StdUnixListener,
    ) -> Result<UnixListener, ServerError> {
        let configure = |source| ServerError::Configure {
            path: path.to_path_buf(),
            source,
        };
        if let Some(mode) = self.socket_mode {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(configure)?;
        }
        std_listener.set_nonblocking(true).map_err(configure)?;
        UnixListener::from_std(std_listener).map_err(configure)
    }

    fn into_bound(
        self,
        listener: UnixListener,
        artifact: Arc<SocketArtifact>,
    ) -> RunnerServer<C, Bound> {
        let RunnerServer {
            pipeline,
            handler,
            ready_tx,
            backoff_config,
            shutdown_deadline,
            socket_mode,
            lifecycle,
            ..
        } = self;

        let listening = lifecycle.advance(LifecycleState::Created, LifecycleState::Listening);
        debug_assert!(listening, "an unbound server is always Created");
        info!(
            "plugin runner is listening on the socket file: {}",
            artifact.path().display()
        );

        RunnerServer {
            pipeline,
            handler,
            ready_tx,
            backoff_config,
            shutdown_deadline,
            socket_mode,
            lifecycle,
            state: Bound { listener, artifact },
        }
    }
}

impl<C: FrameCodec> RunnerServer<C, Bound> {
    /// Path of the bound socket file.
    #[must_use]
    pub fn local_path(&self) -> &Path { self.state.artifact.path() }
}
