//! Shared helpers for the PostgreSQL integration tests

pub mod singleton_container;

pub use singleton_container::test_pool;
