//! Shutdown signal handling.

use roundtrip_agent::MemoryConnection;

/// Waits for a shutdown signal, then closes `connection`.
///
/// Closing the connection ends every agent subscription, so a running
/// measurement finishes early with partial results.
pub async fn close_on_shutdown_signal(connection: MemoryConnection) {
    let event = shutdown_signal().await;

    debug!(event, "got shutdown signal, closing the transport");
    connection.close();
}

/// Waits for `SIGINT` or `SIGTERM`, and returns the signal name.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(error) => {
            warn!(%error, "could not listen for SIGTERM, only handling SIGINT");
            return sigint().await;
        }
    };

    tokio::select! {
        event = sigint() => event,
        _ = sigterm.recv() => "SIGTERM",
    }
}

/// Waits for `SIGINT` (Ctrl-C), and returns the signal name.
#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    sigint().await
}

async fn sigint() -> &'static str {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "could not listen for SIGINT");
        std::future::pending::<()>().await;
    }

    "SIGINT"
}
