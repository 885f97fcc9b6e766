//! SQL dialects and their capabilities

use fairq_core::StoreCapabilities;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relational engines the query builder can render for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDialect {
    /// Detect the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        match scheme {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn capabilities(self) -> StoreCapabilities {
        StoreCapabilities {
            randomized_order: self.random_fn().is_some(),
            representative_aggregate: self.any_value("x").is_some(),
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident),
        }
    }

    /// Per-invocation random ordering expression.
    pub fn random_fn(self) -> Option<&'static str> {
        match self {
            Self::Postgres | Self::Sqlite => Some("RANDOM()"),
            Self::MySql => Some("RAND()"),
        }
    }

    /// Aggregate returning an arbitrary value of `expr` within a group.
    pub fn any_value(self, expr: &str) -> Option<String> {
        match self {
            Self::Postgres => Some(format!("(ARRAY_AGG({}))[1]", expr)),
            Self::MySql => Some(format!("ANY_VALUE({})", expr)),
            Self::Sqlite => None,
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(
            SqlDialect::from_url("postgresql://u:p@localhost/db"),
            Some(SqlDialect::Postgres)
        );
        assert_eq!(SqlDialect::from_url("postgres://localhost"), Some(SqlDialect::Postgres));
        assert_eq!(SqlDialect::from_url("mysql://localhost/db"), Some(SqlDialect::MySql));
        assert_eq!(SqlDialect::from_url("sqlite::memory:"), Some(SqlDialect::Sqlite));
        assert_eq!(SqlDialect::from_url("redis://localhost"), None);
    }

    #[test]
    fn test_sqlite_lacks_representative_aggregate() {
        let caps = SqlDialect::Sqlite.capabilities();
        assert!(caps.randomized_order);
        assert!(!caps.representative_aggregate);

        assert_eq!(SqlDialect::Postgres.capabilities(), StoreCapabilities::full());
        assert_eq!(SqlDialect::MySql.capabilities(), StoreCapabilities::full());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqlDialect::Postgres.placeholder(3), "$3");
        assert_eq!(SqlDialect::MySql.placeholder(3), "?");
    }
}
