//! Configuration for the fairness layer

mod app_config;
#[cfg(test)]
mod tests;

pub use app_config::{
    AppConfig, ConfigError, DatabaseConfig, FairnessConfig, LoggingConfig, Result,
};
