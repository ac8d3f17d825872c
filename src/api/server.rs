//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::engine::AllocationEngine;

use super::routes::routes;

/// Serve the engine over HTTP until Ctrl+C.
pub async fn serve(config: ServerConfig, engine: Arc<AllocationEngine>) -> anyhow::Result<()> {
    let app = routes(engine);

    let addr: SocketAddr = config.addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Starting OPD token engine on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            // Without a signal handler the server only stops with the process.
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await
        }
    }
}
