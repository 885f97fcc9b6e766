//! Job Store Port
//!
//! The job queue itself is owned elsewhere. The fairness layer needs three
//! things from it: per-tenant busy/waiting counts, the relational features
//! its selection query relies on, and a claim routine that accepts an
//! ordered candidate query.

use async_trait::async_trait;
use fairq_core::{
    CandidateQuery, ClaimedJob, FairnessError, QueueScope, StoreCapabilities, WorkerName,
};

/// Busy and waiting counts for one tenant as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantCountRow {
    pub tenant_key: String,
    pub busy: i64,
    pub waiting: i64,
}

/// Job store port
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Name of the engine, used in error messages
    fn engine(&self) -> &str;

    /// Relational features available to candidate queries
    fn capabilities(&self) -> StoreCapabilities;

    /// Count busy and waiting jobs per tenant within `scope`. Jobs with a
    /// recorded error are not counted.
    async fn tenant_counts(&self, scope: &QueueScope)
        -> Result<Vec<TenantCountRow>, JobStoreError>;

    /// Run `query` and lock the first candidate no other worker has taken.
    async fn claim(
        &self,
        query: &CandidateQuery,
        worker: &WorkerName,
    ) -> Result<Option<ClaimedJob>, JobStoreError>;
}

/// Job store error
#[derive(thiserror::Error, Debug)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

impl From<JobStoreError> for FairnessError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::Database(msg) => FairnessError::Store(msg),
            JobStoreError::Unsupported(msg) => FairnessError::Configuration(msg),
        }
    }
}
