//! PostgreSQL Job Store
//!
//! Reference job table for the fairness layer. Runs the rendered candidate
//! query and claims the first candidate whose guarded update succeeds.

use async_trait::async_trait;
use fairq_core::{
    CandidateQuery, ClaimedJob, JobId, QueueScope, StoreCapabilities, TenantKey, WorkerName,
};
use fairq_ports::{JobStore, JobStoreError, TenantCountRow};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use crate::sql::{FairSqlBuilder, JobTable, SqlDialect, SqlStatement, SqlValue, TableName};

/// PostgreSQL-backed job store
#[derive(Debug, Clone)]
pub struct PostgreSqlJobStore {
    pool: PgPool,
    builder: FairSqlBuilder,
}

impl PostgreSqlJobStore {
    pub fn new(pool: PgPool, jobs: TableName, ranks: TableName) -> Self {
        Self {
            pool,
            builder: FairSqlBuilder::new(SqlDialect::Postgres, JobTable::new(jobs), ranks),
        }
    }

    fn table(&self) -> &TableName {
        &self.builder.jobs().name
    }

    /// Create the job table with the fair key column and its indexes
    pub async fn init_schema(&self) -> Result<(), JobStoreError> {
        info!(table = %self.table(), "Initializing job schema");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id BIGSERIAL PRIMARY KEY,
                fair_key TEXT NOT NULL,
                queue TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                handler TEXT NOT NULL DEFAULT '',
                run_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                locked_at TIMESTAMPTZ,
                locked_by TEXT,
                failed_at TIMESTAMPTZ,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            table = self.table()
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| JobStoreError::Database(format!("Failed to create job table: {}", e)))?;

        let index_name = self.table().as_str().replace('.', "_");
        let index_queries = vec![
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{index}_fair_key ON {table}(fair_key)",
                index = index_name,
                table = self.table()
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{index}_ready ON {table}(priority, run_at) WHERE locked_at IS NULL AND failed_at IS NULL",
                index = index_name,
                table = self.table()
            ),
        ];

        for query in index_queries {
            sqlx::query(&query)
                .execute(&self.pool)
                .await
                .map_err(|e| JobStoreError::Database(format!("Failed to create index: {}", e)))?;
        }

        info!(table = %self.table(), "Job schema initialized");
        Ok(())
    }

    /// Insert a runnable job
    pub async fn enqueue(
        &self,
        tenant_key: &TenantKey,
        queue: Option<&str>,
        priority: i32,
    ) -> Result<JobId, JobStoreError> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {table} (fair_key, queue, priority) VALUES ($1, $2, $3) RETURNING id",
            table = self.table()
        ))
        .bind(tenant_key.as_str())
        .bind(queue)
        .bind(priority)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| JobStoreError::Database(format!("Failed to enqueue job: {}", e)))?;

        Ok(JobId(id))
    }

    /// Remove a finished job
    pub async fn complete(&self, id: JobId) -> Result<(), JobStoreError> {
        sqlx::query(&format!("DELETE FROM {table} WHERE id = $1", table = self.table()))
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| JobStoreError::Database(format!("Failed to complete job: {}", e)))?;
        Ok(())
    }

    async fn try_lock(
        &self,
        id: i64,
        worker: &WorkerName,
    ) -> Result<Option<ClaimedJob>, JobStoreError> {
        let row = sqlx::query(&format!(
            r#"UPDATE {table}
               SET locked_at = now(), locked_by = $1
               WHERE id = $2 AND locked_at IS NULL AND failed_at IS NULL
               RETURNING id, fair_key, queue, priority"#,
            table = self.table()
        ))
        .bind(worker.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| JobStoreError::Database(format!("Failed to lock job {}: {}", id, e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(ClaimedJob {
            id: JobId(row.get("id")),
            tenant_key: row.get("fair_key"),
            queue: row.get("queue"),
            priority: row.get("priority"),
            locked_by: worker.clone(),
        }))
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in binds {
        query = match value {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

#[async_trait]
impl JobStore for PostgreSqlJobStore {
    fn engine(&self) -> &str {
        "postgres"
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.builder.dialect().capabilities()
    }

    async fn tenant_counts(
        &self,
        scope: &QueueScope,
    ) -> Result<Vec<TenantCountRow>, JobStoreError> {
        let SqlStatement { sql, binds } = self.builder.tenant_counts(scope);

        let rows = bind_values(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JobStoreError::Database(format!("Failed to count tenant jobs: {}", e)))?;

        debug!(tenants = rows.len(), "Fetched tenant job counts");

        Ok(rows
            .into_iter()
            .map(|row| TenantCountRow {
                tenant_key: row.get("tenant_key"),
                busy: row.get("busy"),
                waiting: row.get("waiting"),
            })
            .collect())
    }

    async fn claim(
        &self,
        query: &CandidateQuery,
        worker: &WorkerName,
    ) -> Result<Option<ClaimedJob>, JobStoreError> {
        let SqlStatement { sql, binds } = self
            .builder
            .candidates(query)
            .map_err(|e| JobStoreError::Unsupported(e.to_string()))?;

        let candidates: Vec<i64> = bind_values(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JobStoreError::Database(format!("Failed to select candidates: {}", e)))?
            .iter()
            .map(|row| row.get(0))
            .collect();

        debug!(candidates = candidates.len(), fair = query.is_fair(), "Selected claim candidates");

        // Another worker may win any candidate between select and update;
        // move on to the next one.
        for id in candidates {
            if let Some(job) = self.try_lock(id, worker).await? {
                debug!(job_id = %job.id, tenant = %job.tenant_key, worker = %worker, "Claimed job");
                return Ok(Some(job));
            }
        }

        Ok(None)
    }
}
