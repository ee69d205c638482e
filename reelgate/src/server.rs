//! HTTP server lifecycle
//!
//! Binds the listener, serves the API and drains in-flight requests and
//! publish tasks on SIGINT or SIGTERM.

use std::{net::SocketAddr, time::Duration};

use reelgate_api::{create_router, AppState};
use reelgate_core::{bootstrap::Services, Config};
use tracing::{error, info, warn};

/// How long running YouTube uploads may take to finish after the listener closes
const PUBLISH_DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ReelgateServer {
    config: Config,
    services: Services,
}

impl ReelgateServer {
    pub const fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    /// Serve until a shutdown signal arrives
    pub async fn start(self) -> anyhow::Result<()> {
        let http_address = self.config.http_address();
        let http_addr: SocketAddr = http_address
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP address '{http_address}': {e}"))?;

        let state = AppState::new(&self.services, &self.config);
        let router = create_router(state, &self.config.server);

        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {http_addr}: {e}"))?;
        info!("HTTP server listening on {}", http_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("HTTP server error: {}", e);
                anyhow::anyhow!("HTTP server error: {e}")
            })?;

        info!("HTTP server shut down gracefully");

        if !self
            .services
            .publish_service
            .shutdown(PUBLISH_DRAIN_TIMEOUT)
            .await
        {
            warn!("Publish tasks still running at exit; they will be marked failed on next start");
        }
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C, shutting down"); }
        () = terminate => { info!("Received SIGTERM, shutting down"); }
    }
}
