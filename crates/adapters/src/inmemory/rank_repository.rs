use async_trait::async_trait;
use fairq_core::{Generation, RankRow};
use fairq_ports::{GenerationPointer, RankRepositoryError, RankSnapshotStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RankTable {
    pointer: Option<Generation>,
    rows: Vec<RankRow>,
}

impl RankTable {
    /// The pointer is created on first access.
    fn pointer_mut(&mut self) -> &mut Generation {
        self.pointer.get_or_insert(Generation::INITIAL)
    }
}

/// In-memory generation pointer and rank snapshot store
#[derive(Debug, Clone, Default)]
pub struct InMemoryRankRepository {
    table: Arc<RwLock<RankTable>>,
}

impl InMemoryRankRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored rank row of every generation
    pub async fn all_rows(&self) -> Vec<RankRow> {
        self.table.read().await.rows.clone()
    }
}

#[async_trait]
impl GenerationPointer for InMemoryRankRepository {
    async fn current(&self) -> Result<Generation, RankRepositoryError> {
        let mut table = self.table.write().await;
        Ok(*table.pointer_mut())
    }

    async fn advance(&self, generation: Generation) -> Result<(), RankRepositoryError> {
        let mut table = self.table.write().await;
        let pointer = table.pointer_mut();
        let previous = *pointer;
        *pointer = generation;
        info!(%previous, current = %generation, "Advanced generation pointer");
        Ok(())
    }
}

#[async_trait]
impl RankSnapshotStore for InMemoryRankRepository {
    async fn write_generation(
        &self,
        rows: &[RankRow],
        generation: Generation,
        batch_size: usize,
    ) -> Result<(), RankRepositoryError> {
        if batch_size == 0 {
            return Err(RankRepositoryError::Validation(
                "batch_size must be > 0".to_string(),
            ));
        }

        let mut table = self.table.write().await;
        let duplicate = rows.iter().enumerate().find(|(i, row)| {
            rows[..*i].iter().any(|r| r.tenant_key == row.tenant_key)
                || table
                    .rows
                    .iter()
                    .any(|r| r.generation == generation && r.tenant_key == row.tenant_key)
        });
        if let Some((_, row)) = duplicate {
            return Err(RankRepositoryError::Database(format!(
                "duplicate rank for tenant {} in generation {}",
                row.tenant_key, generation
            )));
        }

        for (batch, chunk) in rows.chunks(batch_size).enumerate() {
            table.rows.extend(chunk.iter().cloned().map(|row| RankRow {
                generation,
                ..row
            }));
            debug!(%generation, batch, rows = chunk.len(), "Wrote rank batch");
        }

        info!(%generation, rows = rows.len(), "Wrote rank generation");
        Ok(())
    }

    async fn current_rows(&self) -> Result<Vec<RankRow>, RankRepositoryError> {
        let mut table = self.table.write().await;
        let current = *table.pointer_mut();
        Ok(table
            .rows
            .iter()
            .filter(|row| row.generation == current)
            .cloned()
            .collect())
    }

    async fn top_ranks(
        &self,
        generation: Generation,
        k: u32,
    ) -> Result<Vec<RankRow>, RankRepositoryError> {
        let table = self.table.read().await;
        let mut rows: Vec<RankRow> = table
            .rows
            .iter()
            .filter(|row| row.generation == generation)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.rank.cmp(&a.rank).then_with(|| a.tenant_key.cmp(&b.tenant_key)));
        rows.truncate(k as usize);
        Ok(rows)
    }

    async fn cleanup_stale(&self) -> Result<u64, RankRepositoryError> {
        let mut table = self.table.write().await;
        let current = *table.pointer_mut();
        let before = table.rows.len();
        table.rows.retain(|row| row.generation >= current);
        let deleted = (before - table.rows.len()) as u64;
        info!(%current, deleted, "Deleted stale rank generations");
        Ok(deleted)
    }
}
