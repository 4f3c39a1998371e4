//! Configuration utilities for [`RunnerServer`].

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use super::{
    BackoffConfig,
    DEFAULT_SHUTDOWN_DEADLINE,
    RunnerServer,
    Unbound,
    lifecycle::Lifecycle,
};
use crate::{
    codec::FrameCodec,
    diagnostics::DiagnosticStage,
    handler::RequestHandler,
    pipeline::PipelineFactory,
};

impl<C: FrameCodec> RunnerServer<C, Unbound> {
    /// Create a server framing connections with `codec`.
    ///
    /// No diagnostic stages or handler are installed. Without a handler,
    /// frames are decoded and dropped. The shutdown deadline defaults to
    /// [`DEFAULT_SHUTDOWN_DEADLINE`].
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            pipeline: PipelineFactory::new(codec),
            handler: None,
            ready_tx: None,
            backoff_config: BackoffConfig::default(),
            shutdown_deadline: DEFAULT_SHUTDOWN_DEADLINE,
            socket_mode: None,
            lifecycle: Lifecycle::new(),
            state: Unbound,
        }
    }

    /// Append a diagnostic stage to every connection pipeline.
    ///
    /// Stages run in the order they are added, all ahead of framing.
    #[must_use]
    pub fn with_diagnostic<D: DiagnosticStage>(mut self, stage: D) -> Self {
        self.pipeline = self.pipeline.with_diagnostic(stage);
        self
    }

    /// Install the handler serving every connection, replacing any previous
    /// one.
    #[must_use]
    pub fn with_handler<H: RequestHandler<C>>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set how long open connections may run once shutdown begins.
    #[must_use]
    pub fn shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    /// Apply `mode` permission bits to the socket file after binding.
    #[must_use]
    pub fn socket_permissions(mut self, mode: u32) -> Self {
        self.socket_mode = Some(mode);
        self
    }

    /// Configure the retry delays used when `accept()` fails.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff.normalized();
        self
    }

    /// Configure a channel used to signal when the server is accepting
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured shutdown deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration { self.shutdown_deadline }

    /// Returns `true` if a handler is installed.
    #[must_use]
    pub fn has_handler(&self) -> bool { self.handler.is_some() }
}
