//! Ports - Abstraction Layer
//!
//! This crate defines the storage traits the fairness layer depends on.
//! They are implemented by adapters in `fairq-adapters`.

pub mod job_store;
pub mod rank_repository;

pub use crate::job_store::{JobStore, JobStoreError, TenantCountRow};
pub use crate::rank_repository::{GenerationPointer, RankRepositoryError, RankSnapshotStore};
