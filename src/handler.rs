//! Request handlers consuming framed connections.
//!
//! A handler is the terminal stage of every connection. It receives the
//! [`FramedConnection`] once its pipeline is installed and owns the
//! conversation from then on: it reads frames in arrival order and writes
//! responses. Returning ends the connection.

use std::io;

use async_trait::async_trait;

use crate::{codec::FrameCodec, connection::FramedConnection};

/// Business logic attached to every accepted connection.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use plugin_runner::{
///     codec::{RunnerFrame, RunnerFrameCodec},
///     connection::FramedConnection,
///     handler::RequestHandler,
/// };
///
/// struct Ack;
///
/// #[async_trait]
/// impl RequestHandler<RunnerFrameCodec> for Ack {
///     async fn handle(
///         &self,
///         conn: &mut FramedConnection<RunnerFrameCodec>,
///     ) -> std::io::Result<()> {
///         while let Some(frame) = conn.next_frame().await {
///             let frame = frame?;
///             conn.send(RunnerFrame::new(frame.kind, &b"ok"[..])).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<C: FrameCodec>: Send + Sync + 'static {
    /// Stage name recorded in the connection pipeline.
    fn name(&self) -> &'static str { "handler" }

    /// Serve one connection until it closes.
    ///
    /// # Errors
    /// Errors are logged and close this connection only.
    async fn handle(&self, conn: &mut FramedConnection<C>) -> io::Result<()>;
}

/// Writes every decoded frame back to the peer unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoHandler;

#[async_trait]
impl<C> RequestHandler<C> for EchoHandler
where
    C: FrameCodec,
{
    fn name(&self) -> &'static str { "echo" }

    async fn handle(&self, conn: &mut FramedConnection<C>) -> io::Result<()> {
        while let Some(frame) = conn.next_frame().await {
            conn.send(frame?).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        codec::{RunnerFrame, RunnerFrameCodec},
        connection::ConnectionId,
        pipeline::PipelineFactory,
    };

    #[tokio::test]
    async fn echo_handler_returns_frames_in_order() {
        let factory = PipelineFactory::new(RunnerFrameCodec::default());
        let (client, server) = duplex(256);
        let mut server_conn = FramedConnection::new(
            server,
            factory.initialize(ConnectionId::new(1)),
            CancellationToken::new(),
        );
        let mut client_conn = FramedConnection::new(
            client,
            factory.initialize(ConnectionId::new(2)),
            CancellationToken::new(),
        );

        let task = tokio::spawn(async move { EchoHandler.handle(&mut server_conn).await });

        for kind in 1..=3_u8 {
            client_conn
                .send(RunnerFrame::new(kind, vec![kind; 3]))
                .await
                .expect("send");
        }
        for kind in 1..=3_u8 {
            let frame = client_conn
                .next_frame()
                .await
                .expect("echo expected")
                .expect("echo decodes");
            assert_eq!(frame, RunnerFrame::new(kind, vec![kind; 3]));
        }
        drop(client_conn);
        task.await.expect("join").expect("echo handler ends cleanly");
    }

    #[test]
    fn echo_handler_name() {
        assert_eq!(RequestHandler::<RunnerFrameCodec>::name(&EchoHandler), "echo");
    }
}
