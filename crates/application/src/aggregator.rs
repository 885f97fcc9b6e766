//! Tenant Stats Aggregator
//!
//! Folds the job store's per-tenant counts into validated [`TenantStats`].

use fairq_core::{FairnessError, QueueScope, Result, TenantKey, TenantStats};
use fairq_ports::JobStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TenantStatsAggregator {
    jobs: Arc<dyn JobStore>,
}

impl TenantStatsAggregator {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    /// Busy and waiting counts per tenant within `scope`.
    ///
    /// Read-only. Store errors are returned as they are, without retry.
    /// Rows whose tenant key cannot be ranked (empty or reserved) are
    /// skipped; their jobs remain selectable as unranked candidates.
    pub async fn collect(&self, scope: &QueueScope) -> Result<BTreeMap<TenantKey, TenantStats>> {
        let rows = self.jobs.tenant_counts(scope).await?;
        let mut stats: BTreeMap<TenantKey, TenantStats> = BTreeMap::new();

        for row in rows {
            let (busy, waiting) = match (u64::try_from(row.busy), u64::try_from(row.waiting)) {
                (Ok(busy), Ok(waiting)) => (busy, waiting),
                _ => {
                    return Err(FairnessError::Validation(format!(
                        "negative job count for tenant {}: busy={} waiting={}",
                        row.tenant_key, row.busy, row.waiting
                    )));
                }
            };

            let tenant_key = match TenantKey::new(row.tenant_key.as_str()) {
                Ok(key) => key,
                Err(e) => {
                    warn!(tenant = %row.tenant_key, error = %e, "Skipping unrankable tenant");
                    continue;
                }
            };

            let entry = stats.entry(tenant_key).or_default();
            entry.busy += busy;
            entry.waiting += waiting;
        }

        debug!(tenants = stats.len(), "Aggregated tenant stats");
        Ok(stats)
    }
}
