//! Database initialization

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;

/// Connect the Postgres pool. Migrations are run by the binary.
pub async fn init_database(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        max_connections = config.max_connections,
        "Connecting to database: {}",
        redact_url(&config.url)
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection failed: {e}")
        })?;

    info!("Database connected successfully");
    Ok(pool)
}

/// Hide the password in a connection URL before logging it
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgresql://app:hunter2@db:5432/reelgate"),
            "postgresql://app:****@db:5432/reelgate"
        );
        assert_eq!(
            redact_url("postgresql://db/reelgate"),
            "postgresql://db/reelgate"
        );
        assert_eq!(redact_url("::nope"), "<invalid url>");
    }
}
