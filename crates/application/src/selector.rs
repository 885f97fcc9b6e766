//! Fairness-Aware Selector
//!
//! Decides how a worker's claim candidates are ordered. Workers whose queue
//! scope is under fairness control get the current generation's top-K ranks
//! joined in; everyone else gets plain priority ordering.

use fairq_core::{CandidateQuery, QueueScope, Result};
use fairq_ports::{GenerationPointer, JobStore};
use std::sync::Arc;
use tracing::debug;

use crate::settings::FairnessSettings;

pub struct FairSelector {
    pointer: Arc<dyn GenerationPointer>,
    settings: FairnessSettings,
}

impl FairSelector {
    pub fn new(pointer: Arc<dyn GenerationPointer>, settings: FairnessSettings) -> Self {
        Self { pointer, settings }
    }

    /// Build the candidate query for a worker polling `scope`.
    ///
    /// The generation is re-read from the pointer on every call and never
    /// waits for a recalculation in flight. Fails with a configuration error
    /// when `jobs` cannot express fair ordering.
    pub async fn candidate_query(
        &self,
        jobs: &dyn JobStore,
        scope: &QueueScope,
    ) -> Result<CandidateQuery> {
        if !self.settings.fair_queues.covers(scope) {
            debug!(?scope, "Queue scope outside fairness control");
            return Ok(CandidateQuery::baseline(
                scope.clone(),
                self.settings.read_ahead,
            ));
        }

        jobs.capabilities().require_fair_selection(jobs.engine())?;

        let generation = self.pointer.current().await?;
        debug!(%generation, top_k = self.settings.top_k, "Using fair candidate ordering");

        Ok(CandidateQuery::fair(
            scope.clone(),
            generation,
            self.settings.top_k,
            self.settings.read_ahead,
        ))
    }
}
