//! PostgreSQL Repository Implementations
//!
//! Persistence for rank generations and the reference job table using the
//! async SQLx driver.

pub mod job_store;
pub mod rank_repository;

pub use job_store::PostgreSqlJobStore;
pub use rank_repository::PostgreSqlRankRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Open a connection pool from configuration
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_millis(config.connection_timeout_ms))
        .connect(&config.url)
        .await?;

    info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(pool)
}
