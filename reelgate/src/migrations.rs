use anyhow::Result;
use sqlx::PgPool;
use tracing::{error, info};

/// Apply embedded migrations. Concurrent replicas are serialized by sqlx's
/// advisory lock on `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            anyhow::anyhow!("Migration failed: {e}")
        })?;

    info!("Migrations completed");
    Ok(())
}
