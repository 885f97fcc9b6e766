//! Server Bootstrap
//!
//! Turns an [`AppConfig`] into connected stores and a ready fairness
//! service.

use fairq_adapters::config::{AppConfig, ConfigError, FairnessConfig};
use fairq_adapters::{postgres, PostgreSqlJobStore, PostgreSqlRankRepository, SqlDialect};
use fairq_application::{FairnessService, FairnessSettings};
use fairq_ports::{JobStoreError, RankRepositoryError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0} is not supported by this server; only PostgreSQL is")]
    UnsupportedDialect(SqlDialect),

    #[error("Failed to connect to the database: {0}")]
    Connect(String),

    #[error("Schema error: {0}")]
    Schema(String),
}

impl From<JobStoreError> for BootstrapError {
    fn from(err: JobStoreError) -> Self {
        BootstrapError::Schema(err.to_string())
    }
}

impl From<RankRepositoryError> for BootstrapError {
    fn from(err: RankRepositoryError) -> Self {
        BootstrapError::Schema(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

#[derive(Clone)]
pub struct ServerComponents {
    pub config: AppConfig,
    pub jobs: Arc<PostgreSqlJobStore>,
    pub ranks: Arc<PostgreSqlRankRepository>,
    pub service: Arc<FairnessService>,
}

impl ServerComponents {
    /// Create the job and rank tables if they do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        self.jobs.init_schema().await?;
        self.ranks.init_schema().await?;
        info!("Database schema initialized");
        Ok(())
    }
}

/// Map the fairness section of the configuration onto service settings
pub fn fairness_settings(config: &FairnessConfig) -> FairnessSettings {
    FairnessSettings {
        fair_queues: config.fair_queues(),
        top_k: config.top_k,
        read_ahead: config.read_ahead,
        batch_size: config.batch_size,
    }
}

pub async fn initialize(config: AppConfig) -> Result<ServerComponents> {
    let dialect = config.database.dialect()?;
    if dialect != SqlDialect::Postgres {
        error!(%dialect, "Unsupported database dialect");
        return Err(BootstrapError::UnsupportedDialect(dialect));
    }

    let jobs_table = config.fairness.jobs_table()?;
    let ranks_table = config.fairness.ranks_table()?;

    let pool = postgres::connect(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to connect to PostgreSQL");
        BootstrapError::Connect(e.to_string())
    })?;

    let jobs = Arc::new(PostgreSqlJobStore::new(
        pool.clone(),
        jobs_table,
        ranks_table.clone(),
    ));
    let ranks = Arc::new(PostgreSqlRankRepository::new(pool, ranks_table));
    let service = Arc::new(FairnessService::new(
        jobs.clone(),
        ranks.clone(),
        fairness_settings(&config.fairness),
    ));

    Ok(ServerComponents {
        config,
        jobs,
        ranks,
        service,
    })
}

pub fn log_config_summary(config: &AppConfig) {
    let fairness = &config.fairness;
    info!(
        max_connections = config.database.max_connections,
        jobs_table = %fairness.jobs_table,
        ranks_table = %fairness.ranks_table,
        fair_queues = ?fairness.queues,
        top_k = fairness.top_k,
        read_ahead = fairness.read_ahead,
        batch_size = fairness.batch_size,
        interval_secs = fairness.recalculate_interval_secs,
        "Configuration summary"
    );
}
