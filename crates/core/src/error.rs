//! Error types shared across the fairness layer

use thiserror::Error;

/// Base error type for the fairness layer
#[derive(Error, Debug)]
pub enum FairnessError {
    /// The storage engine or the configuration cannot support the requested
    /// operation. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Read or write failure reported by the job store or rank store,
    /// passed through unchanged.
    #[error("store error: {0}")]
    Store(String),
}

impl FairnessError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
