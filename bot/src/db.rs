//! Database Layer
//!
//! `PostgreSQL` connection setup for the document store.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::store::StoreBackend;

/// Create `PostgreSQL` connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        // Prevent hanging commands on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Pick the store backend for this process.
///
/// Without `DATABASE_URL` every guild gets an in-memory store.
pub async fn connect_backend(config: &Config) -> Result<StoreBackend> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Ok(StoreBackend::Postgres(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, guild data will not survive a restart");
            Ok(StoreBackend::Memory)
        }
    }
}
