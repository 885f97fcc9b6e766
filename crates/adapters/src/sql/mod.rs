//! SQL rendering for fair-share queries
//!
//! Builds the statements shared by every relational adapter: the candidate
//! query with its top-K rank join, and the per-tenant busy/waiting
//! aggregate. Engine differences (placeholders, identifier quoting, random
//! ordering, representative-value aggregation) live in [`SqlDialect`].

pub mod dialect;
pub mod query_builder;
pub mod table;

pub use dialect::SqlDialect;
pub use query_builder::{FairSqlBuilder, SqlStatement, SqlValue};
pub use table::{JobTable, TableName};
