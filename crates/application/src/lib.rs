//! Application Layer
//!
//! Orchestrates tenant stats aggregation, rank recalculation and
//! fairness-aware candidate selection on top of the storage ports.

pub mod aggregator;
pub mod recalculation;
pub mod scheduler;
pub mod selector;
pub mod service;
pub mod settings;

// Re-exports
pub use aggregator::TenantStatsAggregator;
pub use recalculation::FairnessRecalculator;
pub use scheduler::RecalculationScheduler;
pub use selector::FairSelector;
pub use service::FairnessService;
pub use settings::FairnessSettings;
