//! Tuning knobs for the fairness services

use fairq_core::{FairQueues, QueueScope};

/// Settings shared by the recalculation driver and the selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessSettings {
    /// Queues under fairness control; empty means every queue
    pub fair_queues: FairQueues,
    /// Best-ranked tenants joined onto candidates
    pub top_k: u32,
    /// Candidates fetched per claim attempt
    pub read_ahead: u32,
    /// Rank rows per insert statement
    pub batch_size: usize,
}

impl Default for FairnessSettings {
    fn default() -> Self {
        Self {
            fair_queues: FairQueues::all(),
            top_k: 100,
            read_ahead: 5,
            batch_size: 200,
        }
    }
}

impl FairnessSettings {
    /// Queues the tenant stats aggregate is restricted to
    pub fn stats_scope(&self) -> QueueScope {
        self.fair_queues.as_scope()
    }
}
