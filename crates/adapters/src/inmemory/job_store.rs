use async_trait::async_trait;
use fairq_core::{
    CandidateOrdering, CandidateQuery, ClaimedJob, JobId, QueueScope, StoreCapabilities,
    TenantKey, WorkerName,
};
use fairq_ports::{JobStore, JobStoreError, RankSnapshotStore, TenantCountRow};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A job row of the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryJob {
    pub id: JobId,
    pub tenant_key: TenantKey,
    pub queue: Option<String>,
    pub priority: i32,
    pub locked_by: Option<WorkerName>,
    pub failed: bool,
    pub last_error: Option<String>,
}

impl InMemoryJob {
    fn is_ready(&self) -> bool {
        self.locked_by.is_none() && !self.failed
    }
}

#[derive(Debug, Default)]
struct JobTable {
    next_id: i64,
    jobs: Vec<InMemoryJob>,
}

struct Candidate {
    index: usize,
    priority: i32,
    rank: Option<i64>,
    tie: u64,
}

/// Priority ascending, ranked before unranked, rank descending, then the
/// random tie-break.
fn candidate_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| match (a.rank, b.rank) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.tie.cmp(&b.tie))
}

/// In-memory job store that evaluates candidate queries against a rank
/// snapshot store
#[derive(Clone)]
pub struct InMemoryJobStore {
    table: Arc<Mutex<JobTable>>,
    ranks: Arc<dyn RankSnapshotStore>,
    capabilities: StoreCapabilities,
}

impl InMemoryJobStore {
    pub fn new(ranks: Arc<dyn RankSnapshotStore>) -> Self {
        Self {
            table: Arc::new(Mutex::new(JobTable::default())),
            ranks,
            capabilities: StoreCapabilities::full(),
        }
    }

    /// Pretend to be an engine with a reduced feature set
    pub fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub async fn enqueue(&self, tenant_key: &TenantKey, queue: Option<&str>, priority: i32) -> JobId {
        let mut table = self.table.lock().await;
        table.next_id += 1;
        let id = JobId(table.next_id);
        table.jobs.push(InMemoryJob {
            id,
            tenant_key: tenant_key.clone(),
            queue: queue.map(str::to_string),
            priority,
            locked_by: None,
            failed: false,
            last_error: None,
        });
        id
    }

    /// Remove a finished job. Returns whether it existed.
    pub async fn complete(&self, id: JobId) -> bool {
        let mut table = self.table.lock().await;
        let before = table.jobs.len();
        table.jobs.retain(|job| job.id != id);
        table.jobs.len() != before
    }

    /// Lock a specific job for `worker`, as if it had been claimed.
    pub async fn lock(&self, id: JobId, worker: &WorkerName) -> bool {
        let mut table = self.table.lock().await;
        match table.jobs.iter_mut().find(|job| job.id == id && job.is_ready()) {
            Some(job) => {
                job.locked_by = Some(worker.clone());
                true
            }
            None => false,
        }
    }

    /// Unlock a job and record the error of its last attempt.
    pub async fn record_error(&self, id: JobId, error: &str) -> bool {
        let mut table = self.table.lock().await;
        match table.jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => {
                job.locked_by = None;
                job.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    /// Mark a job as permanently failed.
    pub async fn fail(&self, id: JobId) -> bool {
        let mut table = self.table.lock().await;
        match table.jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => {
                job.locked_by = None;
                job.failed = true;
                true
            }
            None => false,
        }
    }

    pub async fn jobs(&self) -> Vec<InMemoryJob> {
        self.table.lock().await.jobs.clone()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    fn engine(&self) -> &str {
        "in-memory"
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn tenant_counts(
        &self,
        scope: &QueueScope,
    ) -> Result<Vec<TenantCountRow>, JobStoreError> {
        let table = self.table.lock().await;
        let mut counts: BTreeMap<&str, (i64, i64)> = BTreeMap::new();

        for job in table.jobs.iter().filter(|job| {
            !job.failed && job.last_error.is_none() && scope.contains(job.queue.as_deref())
        }) {
            let entry = counts.entry(job.tenant_key.as_str()).or_default();
            if job.locked_by.is_some() {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(tenant_key, (busy, waiting))| TenantCountRow {
                tenant_key: tenant_key.to_string(),
                busy,
                waiting,
            })
            .collect())
    }

    async fn claim(
        &self,
        query: &CandidateQuery,
        worker: &WorkerName,
    ) -> Result<Option<ClaimedJob>, JobStoreError> {
        let ranks: HashMap<TenantKey, i64> = match query.ordering {
            CandidateOrdering::Baseline => HashMap::new(),
            CandidateOrdering::Fair { generation, top_k } => {
                self.capabilities
                    .require_fair_selection(self.engine())
                    .map_err(|e| JobStoreError::Unsupported(e.to_string()))?;
                self.ranks
                    .top_ranks(generation, top_k)
                    .await
                    .map_err(|e| JobStoreError::Database(e.to_string()))?
                    .into_iter()
                    .map(|row| (row.tenant_key, row.rank))
                    .collect()
            }
        };

        let mut table = self.table.lock().await;
        let mut candidates: Vec<Candidate> = table
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.is_ready() && query.scope.contains(job.queue.as_deref()))
            .map(|(index, job)| Candidate {
                index,
                priority: job.priority,
                rank: ranks.get(&job.tenant_key).copied(),
                tie: rand::random(),
            })
            .collect();
        candidates.sort_by(candidate_order);
        candidates.truncate(query.limit as usize);

        debug!(candidates = candidates.len(), fair = query.is_fair(), "Selected claim candidates");

        // The table lock is held, so the first candidate is always free.
        let Some(first) = candidates.first() else {
            return Ok(None);
        };
        let job = &mut table.jobs[first.index];
        job.locked_by = Some(worker.clone());

        Ok(Some(ClaimedJob {
            id: job.id,
            tenant_key: job.tenant_key.to_string(),
            queue: job.queue.clone(),
            priority: job.priority,
            locked_by: worker.clone(),
        }))
    }
}
