use std::sync::Arc;
use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};
use thiserror::Error;

use crate::{
    config::Config,
    store::{MemoryStore, PgStore, Store},
};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// PostgreSQL (migrated to the latest schema) when `DATABASE_URL` is set,
/// otherwise a process-local store that starts empty.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>, StartupError> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory store; data will not persist");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = connect(database_url, config.database_max_connections).await?;
    tracing::info!(
        "Database connection pool created (max {} connections)",
        config.database_max_connections
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations completed");

    Ok(Arc::new(PgStore::new(pool)))
}
