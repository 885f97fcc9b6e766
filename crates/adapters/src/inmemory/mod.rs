//! In-Memory Repository Implementations
//!
//! Process-local stand-ins for the PostgreSQL adapters. They honor the same
//! contracts (generation tagging, pointer semantics, ordering rules) and back
//! the end-to-end tests of the application layer.

mod job_store;
mod rank_repository;

pub use job_store::{InMemoryJob, InMemoryJobStore};
pub use rank_repository::InMemoryRankRepository;
