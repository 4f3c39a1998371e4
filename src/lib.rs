#![doc(html_root_url = "https://docs.rs/plugin-runner/latest")]
//! Public API for the `plugin-runner` library.
//!
//! The runner listens on a Unix domain socket for an API gateway. Every
//! accepted connection gets its own pipeline of diagnostic stages, a framing
//! decoder and an optional request handler, and the listener shuts down
//! within a bounded deadline when disposed.

pub mod address;
pub mod byte_order;
pub mod codec;
pub mod connection;
pub mod diagnostics;
pub mod handler;
pub mod metrics;
mod observed_stream;
pub mod panic;
pub mod pipeline;
pub mod server;
#[cfg(test)]
pub(crate) mod test_helpers;

pub use address::{AddressError, ListenerConfig, LocalAddress, resolve};
pub use codec::{FrameCodec, RunnerFrame, RunnerFrameCodec};
pub use connection::{ConnectionId, FramedConnection};
pub use diagnostics::{DiagnosticStage, LoggingStage};
pub use handler::{EchoHandler, RequestHandler};
pub use metrics::{CONNECTION_PANICS, CONNECTIONS_ACTIVE, ERRORS_TOTAL, FRAMES_DECODED};
pub use pipeline::{PipelineError, PipelineFactory, StageDescriptor, StageKind};
pub use server::{LifecycleState, RunnerServer, ServerError, ServerHandle};
