mod migrations;
mod server;

use anyhow::Result;
use tracing::info;

use reelgate_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};

use server::ReelgateServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Reelgate server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize database
    let pool = init_database(&config.database).await?;

    // 4. Run migrations
    migrations::run_migrations(&pool).await?;

    // 5. Initialize services
    let services = init_services(pool.clone(), &config)?;
    let recovered = services.publish_service.recover_interrupted().await?;
    if recovered > 0 {
        info!(recovered, "Marked interrupted publishes as failed");
    }

    // 6. Serve until SIGINT/SIGTERM
    ReelgateServer::new(config, services).start().await?;

    pool.close().await;
    info!("Reelgate server stopped");
    Ok(())
}
