//! PostgreSQL Rank Repository
//!
//! One table holds every generation's rank rows plus the sentinel row that
//! publishes the current generation.

use async_trait::async_trait;
use fairq_core::{Generation, RankRow, TenantKey, SENTINEL_RANK, SENTINEL_TENANT_KEY};
use fairq_ports::{GenerationPointer, RankRepositoryError, RankSnapshotStore};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use crate::sql::TableName;

/// PostgreSQL-backed generation pointer and rank snapshot store
#[derive(Debug, Clone)]
pub struct PostgreSqlRankRepository {
    pool: PgPool,
    table: TableName,
}

impl PostgreSqlRankRepository {
    pub fn new(pool: PgPool, table: TableName) -> Self {
        Self { pool, table }
    }

    /// Create the rank table and its indexes
    pub async fn init_schema(&self) -> Result<(), RankRepositoryError> {
        info!(table = %self.table, "Initializing rank schema");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                tenant_key TEXT NOT NULL,
                busy BIGINT NOT NULL DEFAULT 0,
                waiting BIGINT NOT NULL DEFAULT 0,
                "rank" BIGINT NOT NULL,
                generation BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RankRepositoryError::Database(format!("Failed to create rank table: {}", e))
        })?;

        let index_name = self.table.as_str().replace('.', "_");
        let index_queries = vec![
            // One row per tenant per generation
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{index}_generation_tenant ON {table}(generation, tenant_key)",
                index = index_name,
                table = self.table
            ),
            // Pointer lookup
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{index}_tenant_generation ON {table}(tenant_key, generation DESC)",
                index = index_name,
                table = self.table
            ),
        ];

        for query in index_queries {
            sqlx::query(&query).execute(&self.pool).await.map_err(|e| {
                RankRepositoryError::Database(format!("Failed to create index: {}", e))
            })?;
        }

        info!(table = %self.table, "Rank schema initialized");
        Ok(())
    }

    /// Return the id and generation of the pointer row, creating it first if
    /// it does not exist.
    async fn system_record(&self) -> Result<(i64, Generation), RankRepositoryError> {
        if let Some(record) = self.find_system_record().await? {
            return Ok(record);
        }

        // Concurrent creators collide on the unique index; the loser reads
        // the winner's row.
        sqlx::query(&format!(
            r#"INSERT INTO {table} (tenant_key, busy, waiting, "rank", generation)
               VALUES ($1, 0, 0, $2, $3)
               ON CONFLICT (generation, tenant_key) DO NOTHING"#,
            table = self.table
        ))
        .bind(SENTINEL_TENANT_KEY)
        .bind(SENTINEL_RANK)
        .bind(Generation::INITIAL.value())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RankRepositoryError::Database(format!("Failed to create generation pointer: {}", e))
        })?;

        info!("Created generation pointer");

        self.find_system_record().await?.ok_or_else(|| {
            RankRepositoryError::Database("Generation pointer vanished after insert".to_string())
        })
    }

    async fn find_system_record(&self) -> Result<Option<(i64, Generation)>, RankRepositoryError> {
        let row = sqlx::query(&format!(
            r#"SELECT id, generation FROM {table}
               WHERE tenant_key = $1 AND "rank" = $2
               ORDER BY generation DESC, id DESC
               LIMIT 1"#,
            table = self.table
        ))
        .bind(SENTINEL_TENANT_KEY)
        .bind(SENTINEL_RANK)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            RankRepositoryError::Database(format!("Failed to read generation pointer: {}", e))
        })?;

        Ok(row.map(|row| {
            let id: i64 = row.get("id");
            let generation: i64 = row.get("generation");
            (id, Generation::new(generation))
        }))
    }

    async fn rows_for(&self, generation: Generation) -> Result<Vec<RankRow>, RankRepositoryError> {
        let rows = sqlx::query(&format!(
            r#"SELECT tenant_key, busy, waiting, "rank", generation FROM {table}
               WHERE generation = $1 AND tenant_key <> $2"#,
            table = self.table
        ))
        .bind(generation.value())
        .bind(SENTINEL_TENANT_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RankRepositoryError::Database(format!("Failed to fetch ranks: {}", e)))?;

        rows.iter().map(row_to_rank).collect()
    }
}

fn row_to_rank(row: &PgRow) -> Result<RankRow, RankRepositoryError> {
    let tenant_key: String = row.get("tenant_key");
    let busy: i64 = row.get("busy");
    let waiting: i64 = row.get("waiting");

    Ok(RankRow {
        tenant_key: TenantKey::new(tenant_key)
            .map_err(|e| RankRepositoryError::Validation(e.to_string()))?,
        busy: u64::try_from(busy)
            .map_err(|_| RankRepositoryError::Validation(format!("negative busy count {}", busy)))?,
        waiting: u64::try_from(waiting).map_err(|_| {
            RankRepositoryError::Validation(format!("negative waiting count {}", waiting))
        })?,
        rank: row.get("rank"),
        generation: Generation::new(row.get("generation")),
    })
}

fn count_to_i64(count: u64) -> Result<i64, RankRepositoryError> {
    i64::try_from(count)
        .map_err(|_| RankRepositoryError::Validation(format!("count {} out of range", count)))
}

#[async_trait]
impl GenerationPointer for PostgreSqlRankRepository {
    async fn current(&self) -> Result<Generation, RankRepositoryError> {
        let (_, generation) = self.system_record().await?;
        Ok(generation)
    }

    async fn advance(&self, generation: Generation) -> Result<(), RankRepositoryError> {
        let (id, previous) = self.system_record().await?;

        sqlx::query(&format!(
            "UPDATE {table} SET generation = $1 WHERE id = $2",
            table = self.table
        ))
        .bind(generation.value())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RankRepositoryError::Database(format!("Failed to advance generation pointer: {}", e))
        })?;

        info!(%previous, current = %generation, "Advanced generation pointer");
        Ok(())
    }
}

#[async_trait]
impl RankSnapshotStore for PostgreSqlRankRepository {
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

        // A failed batch rolls back the whole generation so a retry with the
        // same generation value starts clean.
        let mut tx = self.pool.begin().await.map_err(|e| {
            RankRepositoryError::Database(format!("Failed to begin rank write: {}", e))
        })?;

        for (batch, chunk) in rows.chunks(batch_size).enumerate() {
            let values = chunk
                .iter()
                .map(|row| {
                    Ok((
                        row.tenant_key.as_str(),
                        count_to_i64(row.busy)?,
                        count_to_i64(row.waiting)?,
                        row.rank,
                    ))
                })
                .collect::<Result<Vec<_>, RankRepositoryError>>()?;

            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"INSERT INTO {} (tenant_key, busy, waiting, "rank", generation) "#,
                self.table
            ));
            builder.push_values(values, |mut b, (tenant_key, busy, waiting, rank)| {
                b.push_bind(tenant_key)
                    .push_bind(busy)
                    .push_bind(waiting)
                    .push_bind(rank)
                    .push_bind(generation.value());
            });

            builder.build().execute(&mut *tx).await.map_err(|e| {
                RankRepositoryError::Database(format!("Failed to write rank batch {}: {}", batch, e))
            })?;

            debug!(%generation, batch, rows = chunk.len(), "Wrote rank batch");
        }

        tx.commit().await.map_err(|e| {
            RankRepositoryError::Database(format!("Failed to commit rank write: {}", e))
        })?;

        info!(%generation, rows = rows.len(), "Wrote rank generation");
        Ok(())
    }

    async fn current_rows(&self) -> Result<Vec<RankRow>, RankRepositoryError> {
        let generation = self.current().await?;
        self.rows_for(generation).await
    }

    async fn top_ranks(
        &self,
        generation: Generation,
        k: u32,
    ) -> Result<Vec<RankRow>, RankRepositoryError> {
        let rows = sqlx::query(&format!(
            r#"SELECT tenant_key, busy, waiting, "rank", generation FROM {table}
               WHERE generation = $1 AND tenant_key <> $2
               ORDER BY "rank" DESC, tenant_key ASC
               LIMIT $3"#,
            table = self.table
        ))
        .bind(generation.value())
        .bind(SENTINEL_TENANT_KEY)
        .bind(i64::from(k))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RankRepositoryError::Database(format!("Failed to fetch top ranks: {}", e)))?;

        rows.iter().map(row_to_rank).collect()
    }

    async fn cleanup_stale(&self) -> Result<u64, RankRepositoryError> {
        let current = self.current().await?;

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE generation < $1 AND tenant_key <> $2",
            table = self.table
        ))
        .bind(current.value())
        .bind(SENTINEL_TENANT_KEY)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RankRepositoryError::Database(format!("Failed to delete stale ranks: {}", e))
        })?;

        let deleted = result.rows_affected();
        info!(%current, deleted, "Deleted stale rank generations");
        Ok(deleted)
    }
}
