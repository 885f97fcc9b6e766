//! Candidate query model
//!
//! The selector does not write SQL. It describes which candidates a worker
//! may claim and how they must be ordered; each job store turns a
//! [`CandidateQuery`] into its own query (or evaluates it in memory).

use crate::error::FairnessError;
use crate::generation::Generation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The set of queues a worker polls. Empty means every queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueScope {
    queues: BTreeSet<String>,
}

impl QueueScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.queues.iter().map(String::as_str)
    }

    /// Whether a job on `queue` is visible to this scope.
    pub fn contains(&self, queue: Option<&str>) -> bool {
        match queue {
            _ if self.is_all() => true,
            Some(queue) => self.queues.contains(queue),
            None => false,
        }
    }
}

/// Queues placed under fairness control. Empty means every queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FairQueues {
    queues: BTreeSet<String>,
}

impl FairQueues {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.queues.is_empty()
    }

    /// Whether a worker polling `scope` selects with fairness ordering.
    ///
    /// A scope of "all queues" can reach queues outside a non-empty fair set,
    /// so it only participates when every queue is fair.
    pub fn covers(&self, scope: &QueueScope) -> bool {
        if self.is_all() {
            return true;
        }
        !scope.is_all() && scope.queues().all(|q| self.queues.contains(q))
    }

    /// Restriction to apply when aggregating tenant stats.
    pub fn as_scope(&self) -> QueueScope {
        QueueScope {
            queues: self.queues.clone(),
        }
    }
}

/// Relational features a job store must provide for fair selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCapabilities {
    /// A per-invocation random ordering, e.g. `RANDOM()`.
    pub randomized_order: bool,
    /// An aggregate returning an arbitrary value per group, e.g. `ANY_VALUE`.
    pub representative_aggregate: bool,
}

impl StoreCapabilities {
    pub const fn full() -> Self {
        Self {
            randomized_order: true,
            representative_aggregate: true,
        }
    }

    /// Fails with a configuration error unless fair ordering is expressible.
    pub fn require_fair_selection(&self, engine: &str) -> Result<(), FairnessError> {
        let mut missing = Vec::new();
        if !self.randomized_order {
            missing.push("randomized ordering");
        }
        if !self.representative_aggregate {
            missing.push("representative-value aggregate");
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(FairnessError::Configuration(format!(
            "fair selection requires {} which {} does not support",
            missing.join(" and "),
            engine
        )))
    }
}

/// How candidates are ordered before a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateOrdering {
    /// Priority ascending, then a random tie-break.
    Baseline,
    /// The `top_k` best ranks of `generation` are left-joined on tenant key.
    /// Priority ascending, rank descending with unranked tenants last, then
    /// a random tie-break.
    Fair { generation: Generation, top_k: u32 },
}

/// Ordered, limited list of runnable jobs a worker may try to claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    pub scope: QueueScope,
    pub ordering: CandidateOrdering,
    pub limit: u32,
}

impl CandidateQuery {
    pub fn baseline(scope: QueueScope, limit: u32) -> Self {
        Self {
            scope,
            ordering: CandidateOrdering::Baseline,
            limit,
        }
    }

    pub fn fair(scope: QueueScope, generation: Generation, top_k: u32, limit: u32) -> Self {
        Self {
            scope,
            ordering: CandidateOrdering::Fair { generation, top_k },
            limit,
        }
    }

    pub fn is_fair(&self) -> bool {
        matches!(self.ordering, CandidateOrdering::Fair { .. })
    }
}
