//! Adapters - Infrastructure Implementations
//!
//! This crate contains the implementations of the ports defined in
//! fairq-ports: PostgreSQL persistence, the SQL dialect renderer, in-memory
//! stand-ins and application configuration.

pub mod config;
pub mod inmemory;
pub mod postgres;
pub mod sql;

pub use crate::config::{AppConfig, ConfigError, DatabaseConfig, FairnessConfig, LoggingConfig};
pub use crate::inmemory::{InMemoryJob, InMemoryJobStore, InMemoryRankRepository};
pub use crate::postgres::{PostgreSqlJobStore, PostgreSqlRankRepository};
pub use crate::sql::{FairSqlBuilder, JobTable, SqlDialect, TableName};
