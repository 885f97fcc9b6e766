//! Fairness Recalculation Driver
//!
//! aggregate -> rank -> write generation -> advance pointer. The pointer is
//! only advanced once every row of the new generation is stored, so a
//! failed run leaves the previous generation authoritative.

use fairq_core::{Generation, RankEntry, RankRow, Result};
use fairq_ports::RankSnapshotStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::aggregator::TenantStatsAggregator;
use crate::settings::FairnessSettings;

pub struct FairnessRecalculator {
    aggregator: TenantStatsAggregator,
    ranks: Arc<dyn RankSnapshotStore>,
    settings: FairnessSettings,
}

impl FairnessRecalculator {
    pub fn new(
        aggregator: TenantStatsAggregator,
        ranks: Arc<dyn RankSnapshotStore>,
        settings: FairnessSettings,
    ) -> Self {
        Self {
            aggregator,
            ranks,
            settings,
        }
    }

    /// Compute and publish a new generation of ranks.
    ///
    /// Without an explicit generation the run is stamped with
    /// [`Generation::after`] the current one, so back-to-back runs within
    /// the same second still publish distinct generations.
    ///
    /// Returns the published entries. Concurrent runs are not serialized:
    /// whichever advances the pointer last wins and the other generation is
    /// left for [`RankSnapshotStore::cleanup_stale`].
    pub async fn recalculate(&self, requested: Option<Generation>) -> Result<Vec<RankEntry>> {
        let started = Instant::now();

        let previous = self.ranks.current().await?;
        let generation = match requested {
            Some(generation) => {
                if generation < previous {
                    warn!(%previous, %generation, "Publishing a generation older than the current one");
                }
                generation
            }
            None => Generation::after(previous),
        };

        let stats = self
            .aggregator
            .collect(&self.settings.stats_scope())
            .await?;
        let entries: Vec<RankEntry> = stats
            .into_iter()
            .map(|(tenant_key, stats)| RankEntry::from_stats(tenant_key, stats))
            .collect();
        let rows: Vec<RankRow> = entries
            .iter()
            .cloned()
            .map(|entry| entry.with_generation(generation))
            .collect();

        self.ranks
            .write_generation(&rows, generation, self.settings.batch_size)
            .await?;

        self.ranks.advance(generation).await?;

        info!(
            %generation,
            tenants = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recalculated fair ranks"
        );
        Ok(entries)
    }
}
