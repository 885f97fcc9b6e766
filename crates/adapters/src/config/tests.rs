//! Tests for unified application configuration

use crate::config::{AppConfig, DatabaseConfig, FairnessConfig, LoggingConfig};
use crate::sql::SqlDialect;
use serial_test::serial;
use std::io::Write;

fn cleanup_env_vars() {
    unsafe {
        let vars = [
            "FAIRQ_DB_URL",
            "FAIRQ_DB_MAX_CONNECTIONS",
            "FAIRQ_DB_TIMEOUT_MS",
            "FAIRQ_QUEUES",
            "FAIRQ_TOP_K",
            "FAIRQ_BATCH_SIZE",
            "FAIRQ_READ_AHEAD",
            "FAIRQ_RECALCULATE_INTERVAL_SECS",
            "FAIRQ_CLEANUP_AFTER_RECALCULATE",
            "FAIRQ_JOBS_TABLE",
            "FAIRQ_RANKS_TABLE",
            "FAIRQ_LOG_LEVEL",
            "FAIRQ_LOG_FORMAT",
            "FAIRQ_CONFIG_PATH",
            "FAIRQ_CONFIG_YAML",
        ];
        for var in &vars {
            std::env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_defaults_from_env() {
    cleanup_env_vars();

    let config = AppConfig::load().unwrap();

    assert_eq!(config.database.dialect().unwrap(), SqlDialect::Postgres);
    assert_eq!(config.fairness.top_k, 100);
    assert_eq!(config.fairness.batch_size, 200);
    assert_eq!(config.fairness.read_ahead, 5);
    assert!(config.fairness.queues.is_empty());
    assert!(config.fairness.fair_queues().is_all());
    assert_eq!(config.logging.level, "info");
}

#[test]
#[serial]
fn test_fairness_config_from_env() {
    cleanup_env_vars();

    unsafe {
        std::env::set_var("FAIRQ_QUEUES", "imports, exports,,");
        std::env::set_var("FAIRQ_TOP_K", "25");
        std::env::set_var("FAIRQ_BATCH_SIZE", "50");
        std::env::set_var("FAIRQ_CLEANUP_AFTER_RECALCULATE", "false");
        std::env::set_var("FAIRQ_RANKS_TABLE", "queue.fair_ranks");
    }

    let config = FairnessConfig::from_env().unwrap();

    assert_eq!(config.queues, vec!["imports", "exports"]);
    assert_eq!(config.top_k, 25);
    assert_eq!(config.batch_size, 50);
    assert!(!config.cleanup_after_recalculate);
    assert_eq!(config.ranks_table().unwrap().as_str(), "queue.fair_ranks");

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_invalid_number_is_rejected() {
    cleanup_env_vars();

    unsafe {
        std::env::set_var("FAIRQ_TOP_K", "lots");
    }

    let err = FairnessConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("FAIRQ_TOP_K"));

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_load_from_yaml_file() {
    cleanup_env_vars();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
database:
  url: postgresql://fairq:fairq@db:5432/fairq
fairness:
  queues: [imports]
  top_k: 10
logging:
  format: json
"#
    )
    .unwrap();

    unsafe {
        std::env::set_var("FAIRQ_CONFIG_PATH", file.path());
    }

    let config = AppConfig::load().unwrap();
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.fairness.queues, vec!["imports"]);
    assert_eq!(config.fairness.top_k, 10);
    assert_eq!(config.fairness.batch_size, 200);
    assert!(config.logging.is_json());

    cleanup_env_vars();
}

#[test]
#[serial]
fn test_load_from_inline_yaml_validates() {
    cleanup_env_vars();

    unsafe {
        std::env::set_var(
            "FAIRQ_CONFIG_YAML",
            "database:\n  url: postgresql://localhost/db\nfairness:\n  top_k: 0\n",
        );
    }

    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("top_k"));

    cleanup_env_vars();
}

#[test]
fn test_database_config_validation() {
    let invalid = DatabaseConfig {
        url: "postgresql://localhost/db".to_string(),
        max_connections: 0,
        connection_timeout_ms: 5000,
    };
    assert!(invalid.validate().is_err());

    let unknown_scheme = DatabaseConfig {
        url: "redis://localhost".to_string(),
        max_connections: 5,
        connection_timeout_ms: 5000,
    };
    assert!(unknown_scheme.validate().is_err());

    let sqlite = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        connection_timeout_ms: 5000,
    };
    assert_eq!(sqlite.dialect().unwrap(), SqlDialect::Sqlite);
}

#[test]
fn test_fairness_config_rejects_unsafe_table_names() {
    let config = FairnessConfig {
        jobs_table: "jobs; DROP TABLE jobs".to_string(),
        ..FairnessConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_logging_config_validation() {
    let bad = LoggingConfig {
        level: "info".to_string(),
        format: "xml".to_string(),
    };
    assert!(bad.validate().is_err());
    assert!(LoggingConfig::default().validate().is_ok());
}
