//! Plugin runner process.
//!
//! Binds the configured Unix socket, serves the gateway until `SIGINT` or
//! `SIGTERM`, then drains within the shutdown deadline and exits.

mod cli;

use std::time::Duration;

use clap::Parser;
use plugin_runner::{
    address::ListenerConfig,
    codec::RunnerFrameCodec,
    diagnostics::LoggingStage,
    handler::EchoHandler,
    server::RunnerServer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let mut server = RunnerServer::new(RunnerFrameCodec::new(cli.max_frame_length))
        .with_diagnostic(LoggingStage::new(cli.hexdump_limit))
        .shutdown_deadline(Duration::from_secs(cli.shutdown_deadline));
    if let Some(mode) = cli.socket_mode {
        server = server.socket_permissions(mode);
    }
    if cli.echo {
        server = server.with_handler(EchoHandler);
    }

    server
        .bind_config(&ListenerConfig::new(cli.socket_file))?
        .run()
        .await;
    Ok(())
}
