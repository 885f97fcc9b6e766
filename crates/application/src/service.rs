//! Fairness Service
//!
//! Entry points used by the worker layer and by operators: recalculate,
//! fetch the current ranks, clean up superseded generations, and reserve a
//! job with fair ordering.

use fairq_core::{
    CandidateQuery, ClaimedJob, Generation, QueueScope, RankEntry, Result, WorkerName,
};
use fairq_ports::{JobStore, RankSnapshotStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::aggregator::TenantStatsAggregator;
use crate::recalculation::FairnessRecalculator;
use crate::selector::FairSelector;
use crate::settings::FairnessSettings;

pub struct FairnessService {
    jobs: Arc<dyn JobStore>,
    ranks: Arc<dyn RankSnapshotStore>,
    recalculator: FairnessRecalculator,
    selector: FairSelector,
}

impl FairnessService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        ranks: Arc<dyn RankSnapshotStore>,
        settings: FairnessSettings,
    ) -> Self {
        let recalculator = FairnessRecalculator::new(
            TenantStatsAggregator::new(jobs.clone()),
            ranks.clone(),
            settings.clone(),
        );
        let selector = FairSelector::new(ranks.clone(), settings);

        Self {
            jobs,
            ranks,
            recalculator,
            selector,
        }
    }

    /// Publish a new generation, stamped with the current time (bumped past
    /// the current generation if needed) unless one is given.
    #[instrument(skip(self))]
    pub async fn recalculate(&self, generation: Option<Generation>) -> Result<Vec<RankEntry>> {
        self.recalculator.recalculate(generation).await
    }

    /// Ranks of the generation the pointer currently names
    #[instrument(skip(self))]
    pub async fn current_ranks(&self) -> Result<Vec<RankEntry>> {
        let rows = self.ranks.current_rows().await?;
        debug!(tenants = rows.len(), "Fetched current ranks");
        Ok(rows.into_iter().map(|row| row.into_entry()).collect())
    }

    /// The generation the pointer currently names
    pub async fn current_generation(&self) -> Result<Generation> {
        Ok(self.ranks.current().await?)
    }

    /// Delete rank rows of superseded generations
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> Result<u64> {
        Ok(self.ranks.cleanup_stale().await?)
    }

    /// Candidate query a worker polling `scope` would run
    pub async fn candidate_query(&self, scope: &QueueScope) -> Result<CandidateQuery> {
        self.selector
            .candidate_query(self.jobs.as_ref(), scope)
            .await
    }

    /// Select candidates for `scope` and claim one for `worker`.
    #[instrument(skip(self, worker), fields(worker = %worker))]
    pub async fn reserve(
        &self,
        worker: &WorkerName,
        scope: &QueueScope,
    ) -> Result<Option<ClaimedJob>> {
        let query = self.candidate_query(scope).await?;
        let claimed = self.jobs.claim(&query, worker).await?;

        if let Some(job) = &claimed {
            info!(job_id = %job.id, tenant = %job.tenant_key, fair = query.is_fair(), "Reserved job");
        }
        Ok(claimed)
    }
}
