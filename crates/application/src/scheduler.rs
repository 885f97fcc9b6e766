//! Periodic recalculation
//!
//! Runs the recalculation driver on a fixed interval until cancelled. A
//! failed pass is logged and skipped; the previous generation stays
//! published.

use fairq_core::{RankEntry, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::service::FairnessService;

pub struct RecalculationScheduler {
    service: Arc<FairnessService>,
    interval: Duration,
    cleanup: bool,
}

impl RecalculationScheduler {
    pub fn new(service: Arc<FairnessService>, interval: Duration, cleanup: bool) -> Self {
        Self {
            service,
            interval,
            cleanup,
        }
    }

    /// One recalculation pass, followed by cleanup when enabled.
    pub async fn tick(&self) -> Result<Vec<RankEntry>> {
        let entries = self.service.recalculate(None).await?;
        if self.cleanup {
            self.service.cleanup().await?;
        }
        Ok(entries)
    }

    /// Run until `shutdown` is cancelled. The first pass starts immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), cleanup = self.cleanup, "Starting recalculation loop");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Recalculation loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Recalculation failed; keeping previous generation");
                    }
                }
            }
        }
    }
}
