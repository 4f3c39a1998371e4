//! Process signals that trigger shutdown.

use log::{info, warn};
use tokio::{select, signal};

/// Resolve when the process receives `SIGINT` or `SIGTERM`.
///
/// A signal that cannot be registered is logged and never fires; the other
/// one still does.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for SIGINT: error={e}");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: error={e}");
                std::future::pending::<()>().await;
            }
        }
    };
    select! {
        () = interrupt => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
