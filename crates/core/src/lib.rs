//! Domain Core - Fair-Share Ranking Types
//!
//! This crate contains the domain entities, value objects and the rank
//! formula shared by the ports, adapters and application layers.

pub mod error;
pub mod generation;
pub mod job;
pub mod rank;
pub mod selection;
pub mod tenant;

pub use crate::error::FairnessError;
pub use crate::generation::Generation;
pub use crate::job::{ClaimedJob, JobId, WorkerName};
pub use crate::rank::{compute_rank, RankEntry, RankRow, TenantStats, SENTINEL_RANK};
pub use crate::selection::{
    CandidateOrdering, CandidateQuery, FairQueues, QueueScope, StoreCapabilities,
};
pub use crate::tenant::{TenantKey, SENTINEL_TENANT_KEY};

// Domain result type
pub type Result<T> = std::result::Result<T, FairnessError>;
