//! Rank Repository Ports
//!
//! The generation pointer and the rank snapshot store share one table in
//! every adapter, but they are separate contracts: the pointer is the single
//! mutable publication point, rank rows are written once and then only
//! deleted.

use async_trait::async_trait;
use fairq_core::{FairnessError, Generation, RankRow};

/// The record naming the currently published generation.
#[async_trait]
pub trait GenerationPointer: Send + Sync {
    /// Read the current generation, creating the pointer if it does not
    /// exist yet.
    async fn current(&self) -> Result<Generation, RankRepositoryError>;

    /// Overwrite the pointer in place. Last writer wins; advancing to the
    /// value already stored is a no-op.
    async fn advance(&self, generation: Generation) -> Result<(), RankRepositoryError>;
}

/// Per-tenant rank rows, one set per generation.
#[async_trait]
pub trait RankSnapshotStore: GenerationPointer {
    /// Insert every row of a new generation, `batch_size` rows per
    /// statement. Rows are tagged with `generation` regardless of the value
    /// they carry.
    async fn write_generation(
        &self,
        rows: &[RankRow],
        generation: Generation,
        batch_size: usize,
    ) -> Result<(), RankRepositoryError>;

    /// Rows of the generation the pointer currently names.
    async fn current_rows(&self) -> Result<Vec<RankRow>, RankRepositoryError>;

    /// The `k` highest ranked rows of `generation`, rank descending.
    async fn top_ranks(
        &self,
        generation: Generation,
        k: u32,
    ) -> Result<Vec<RankRow>, RankRepositoryError>;

    /// Delete rows older than the pointer's current generation, re-reading
    /// the pointer first. Returns the number of deleted rows.
    async fn cleanup_stale(&self) -> Result<u64, RankRepositoryError>;
}

/// Rank repository error
#[derive(thiserror::Error, Debug)]
pub enum RankRepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid rank data: {0}")]
    Validation(String),
}

impl From<RankRepositoryError> for FairnessError {
    fn from(err: RankRepositoryError) -> Self {
        match err {
            RankRepositoryError::Database(msg) => FairnessError::Store(msg),
            RankRepositoryError::Validation(msg) => FairnessError::Validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_repository_error_display() {
        let database = RankRepositoryError::Database("Connection lost".to_string());
        let validation = RankRepositoryError::Validation("negative busy count".to_string());

        assert!(database.to_string().contains("Database error"));
        assert!(validation.to_string().contains("Invalid rank data"));
    }

    #[test]
    fn test_rank_repository_error_maps_to_store_error() {
        let err: FairnessError = RankRepositoryError::Database("timeout".to_string()).into();
        assert!(matches!(err, FairnessError::Store(msg) if msg == "timeout"));
    }
}
