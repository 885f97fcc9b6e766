//! PostgreSQL fairness integration tests
//!
//! Run with `--features container_tests`; needs a Docker daemon.

#![cfg(feature = "container_tests")]

mod helpers;

use fairq_adapters::{PostgreSqlJobStore, PostgreSqlRankRepository, TableName};
use fairq_core::{
    CandidateQuery, Generation, JobId, QueueScope, RankEntry, RankRow, TenantKey, TenantStats,
    WorkerName,
};
use fairq_ports::{GenerationPointer, JobStore, RankSnapshotStore, TenantCountRow};
use sqlx::PgPool;

use helpers::test_pool;

fn tenant(key: &str) -> TenantKey {
    TenantKey::new(key).unwrap()
}

fn rank_row(key: &str, busy: u64, waiting: u64, generation: i64) -> RankRow {
    RankEntry::from_stats(tenant(key), TenantStats::new(busy, waiting))
        .with_generation(Generation::new(generation))
}

struct Stores {
    pool: PgPool,
    jobs_table: String,
    jobs: PostgreSqlJobStore,
    ranks: PostgreSqlRankRepository,
}

/// Fresh job and rank tables named after the test
async fn stores(name: &str) -> Stores {
    let pool = test_pool().await;
    let jobs_table = format!("jobs_{}", name);
    let ranks_table = format!("ranks_{}", name);

    for table in [&jobs_table, &ranks_table] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&pool)
            .await
            .unwrap();
    }

    let jobs = PostgreSqlJobStore::new(
        pool.clone(),
        TableName::new(jobs_table.clone()).unwrap(),
        TableName::new(ranks_table.clone()).unwrap(),
    );
    let ranks = PostgreSqlRankRepository::new(pool.clone(), TableName::new(ranks_table).unwrap());
    jobs.init_schema().await.unwrap();
    ranks.init_schema().await.unwrap();

    Stores {
        pool,
        jobs_table,
        jobs,
        ranks,
    }
}

impl Stores {
    async fn lock(&self, id: JobId) {
        sqlx::query(&format!(
            "UPDATE {} SET locked_at = now(), locked_by = 'seed' WHERE id = $1",
            self.jobs_table
        ))
        .bind(id.0)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    async fn seed(&self, key: &str, queue: Option<&str>, busy: usize, waiting: usize) {
        for _ in 0..busy {
            let id = self.jobs.enqueue(&tenant(key), queue, 0).await.unwrap();
            self.lock(id).await;
        }
        for _ in 0..waiting {
            self.jobs.enqueue(&tenant(key), queue, 0).await.unwrap();
        }
    }

    /// Publish ranks computed from the current job table.
    async fn publish(&self, generation: i64) {
        let rows: Vec<RankRow> = self
            .jobs
            .tenant_counts(&QueueScope::all())
            .await
            .unwrap()
            .into_iter()
            .map(|row| rank_row(&row.tenant_key, row.busy as u64, row.waiting as u64, generation))
            .collect();
        self.ranks
            .write_generation(&rows, Generation::new(generation), 2)
            .await
            .unwrap();
        self.ranks.advance(Generation::new(generation)).await.unwrap();
    }
}

#[tokio::test]
async fn test_pointer_is_created_lazily_and_advances() {
    let s = stores("pointer").await;

    assert_eq!(s.ranks.current().await.unwrap(), Generation::INITIAL);
    assert_eq!(s.ranks.current().await.unwrap(), Generation::INITIAL);

    s.ranks.advance(Generation::new(42)).await.unwrap();

    // A second handle on the same table sees the same pointer.
    let other = PostgreSqlRankRepository::new(
        s.pool.clone(),
        TableName::new("ranks_pointer").unwrap(),
    );
    assert_eq!(other.current().await.unwrap(), Generation::new(42));

    let pointers: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ranks_pointer WHERE tenant_key = 'FAIRQ_SYSTEM_PRIMARY'",
    )
    .fetch_one(&s.pool)
    .await
    .unwrap();
    assert_eq!(pointers, 1);
}

#[tokio::test]
async fn test_generations_are_isolated_until_cleanup() {
    let s = stores("generations").await;

    let first = vec![rank_row("a", 1, 1, 1), rank_row("b", 0, 3, 1)];
    s.ranks.write_generation(&first, Generation::new(1), 1).await.unwrap();
    s.ranks.advance(Generation::new(1)).await.unwrap();

    let second = vec![
        rank_row("a", 2, 0, 2),
        rank_row("b", 0, 1, 2),
        rank_row("c", 5, 5, 2),
    ];
    s.ranks.write_generation(&second, Generation::new(2), 2).await.unwrap();

    // Written but not published yet.
    assert_eq!(s.ranks.current_rows().await.unwrap().len(), 2);

    s.ranks.advance(Generation::new(2)).await.unwrap();
    let mut current = s.ranks.current_rows().await.unwrap();
    current.sort_by(|a, b| a.tenant_key.cmp(&b.tenant_key));
    assert_eq!(current, second);

    let top = s.ranks.top_ranks(Generation::new(2), 2).await.unwrap();
    let keys: Vec<&str> = top.iter().map(|row| row.tenant_key.as_str()).collect();
    assert_eq!(keys, vec!["b", "a"]);

    assert_eq!(s.ranks.cleanup_stale().await.unwrap(), 2);
    assert_eq!(s.ranks.cleanup_stale().await.unwrap(), 0);
    assert_eq!(s.ranks.current().await.unwrap(), Generation::new(2));
    assert_eq!(s.ranks.current_rows().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_failed_write_leaves_no_partial_generation() {
    let s = stores("partial").await;

    // The duplicate lands in the second batch and aborts the whole write.
    let rows = vec![
        rank_row("a", 0, 1, 7),
        rank_row("b", 0, 1, 7),
        rank_row("a", 1, 1, 7),
    ];
    assert!(s.ranks.write_generation(&rows, Generation::new(7), 2).await.is_err());

    assert!(s.ranks.top_ranks(Generation::new(7), 10).await.unwrap().is_empty());
    assert_eq!(s.ranks.current().await.unwrap(), Generation::INITIAL);
}

#[tokio::test]
async fn test_tenant_counts_skip_failed_and_errored_jobs() {
    let s = stores("counts").await;
    s.seed("a", None, 2, 1).await;
    s.seed("b", Some("other"), 0, 2).await;

    let failed = s.jobs.enqueue(&tenant("a"), None, 0).await.unwrap();
    let errored = s.jobs.enqueue(&tenant("a"), None, 0).await.unwrap();
    sqlx::query("UPDATE jobs_counts SET failed_at = now() WHERE id = $1")
        .bind(failed.0)
        .execute(&s.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE jobs_counts SET last_error = 'boom' WHERE id = $1")
        .bind(errored.0)
        .execute(&s.pool)
        .await
        .unwrap();

    let mut counts = s.jobs.tenant_counts(&QueueScope::all()).await.unwrap();
    counts.sort_by(|x, y| x.tenant_key.cmp(&y.tenant_key));
    assert_eq!(
        counts,
        vec![
            TenantCountRow {
                tenant_key: "a".to_string(),
                busy: 2,
                waiting: 1,
            },
            TenantCountRow {
                tenant_key: "b".to_string(),
                busy: 0,
                waiting: 2,
            },
        ]
    );

    let scoped = s.jobs.tenant_counts(&QueueScope::only(["other"])).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].tenant_key, "b");
}

#[tokio::test]
async fn test_fair_claim_orders_by_rank_within_priority() {
    let s = stores("fair_claim").await;
    s.seed("A", None, 2, 1).await;
    s.seed("B", None, 1, 1).await;
    s.seed("C", None, 0, 1).await;
    s.seed("D", None, 2, 0).await;
    s.publish(1).await;

    let worker = WorkerName::new("worker-1");
    let query = CandidateQuery::fair(QueueScope::all(), Generation::new(1), 100, 5);

    let mut order = Vec::new();
    while let Some(job) = s.jobs.claim(&query, &worker).await.unwrap() {
        assert_eq!(job.locked_by, worker);
        order.push(job.tenant_key.to_string());
    }
    assert_eq!(order, vec!["C", "B", "A"]);
}

#[tokio::test]
async fn test_fair_claim_keeps_tenants_beyond_top_k() {
    let s = stores("top_k").await;
    s.seed("idle", None, 0, 1).await;
    s.seed("busy", None, 3, 1).await;
    let urgent = s.jobs.enqueue(&tenant("busy"), None, -5).await.unwrap();
    s.publish(1).await;

    let worker = WorkerName::new("w");
    let query = CandidateQuery::fair(QueueScope::all(), Generation::new(1), 1, 5);

    let first = s.jobs.claim(&query, &worker).await.unwrap().unwrap();
    let second = s.jobs.claim(&query, &worker).await.unwrap().unwrap();
    let third = s.jobs.claim(&query, &worker).await.unwrap().unwrap();

    assert_eq!(first.id, urgent);
    assert_eq!(second.tenant_key.as_str(), "idle");
    assert_eq!(third.tenant_key.as_str(), "busy");
    assert!(s.jobs.claim(&query, &worker).await.unwrap().is_none());
}

#[tokio::test]
async fn test_baseline_claim_respects_queue_scope() {
    let s = stores("baseline").await;
    s.seed("a", Some("mailers"), 0, 1).await;
    s.seed("b", Some("default"), 0, 1).await;

    let worker = WorkerName::new("w");
    let query = CandidateQuery::baseline(QueueScope::only(["mailers"]), 5);

    let job = s.jobs.claim(&query, &worker).await.unwrap().unwrap();
    assert_eq!(job.queue.as_deref(), Some("mailers"));
    assert!(s.jobs.claim(&query, &worker).await.unwrap().is_none());

    s.jobs.complete(job.id).await.unwrap();
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs_baseline")
        .fetch_one(&s.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_claim_returns_jobs_with_unrankable_fair_key() {
    let s = stores("blank_key").await;
    s.seed("a", None, 1, 0).await;
    s.publish(1).await;
    let blank: i64 = sqlx::query_scalar(
        "INSERT INTO jobs_blank_key (fair_key, priority) VALUES ('', -1) RETURNING id",
    )
    .fetch_one(&s.pool)
    .await
    .unwrap();

    let worker = WorkerName::new("w");
    let query = CandidateQuery::fair(QueueScope::all(), Generation::new(1), 100, 5);

    let job = s.jobs.claim(&query, &worker).await.unwrap().unwrap();
    assert_eq!(job.id, JobId(blank));
    assert_eq!(job.tenant_key, "");
    assert_eq!(job.locked_by, worker);

    let locked_by: Option<String> =
        sqlx::query_scalar("SELECT locked_by FROM jobs_blank_key WHERE id = $1")
            .bind(blank)
            .fetch_one(&s.pool)
            .await
            .unwrap();
    assert_eq!(locked_by.as_deref(), Some("w"));
    assert!(s.jobs.claim(&query, &worker).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_job() {
    let s = stores("concurrent").await;
    for key in ["a", "b", "c"] {
        s.seed(key, None, 0, 5).await;
    }
    s.publish(1).await;

    let query = CandidateQuery::fair(QueueScope::all(), Generation::new(1), 100, 5);
    let mut handles = Vec::new();
    for n in 0..4 {
        let jobs = s.jobs.clone();
        let query = query.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerName::new(format!("worker-{n}"));
            let mut claimed = Vec::new();
            while let Some(job) = jobs.claim(&query, &worker).await.unwrap() {
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let claimed = all.len();
    all.sort();
    all.dedup();
    assert_eq!(claimed, 15);
    assert_eq!(all.len(), 15);
}
