//! Fairq Server
//!
//! Wiring for the `fairq` binary: configuration, stores, tracing and
//! signal handling.

pub mod bootstrap;
pub mod shutdown;
pub mod telemetry;

pub use bootstrap::{initialize, log_config_summary, BootstrapError, ServerComponents};
