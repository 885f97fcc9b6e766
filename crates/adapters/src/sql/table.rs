//! Validated table names and the job table layout

use serde::{Deserialize, Serialize};
use std::fmt;

/// A table name safe to splice into SQL text.
///
/// Accepts `table` or `schema.table`, each part matching
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.split('.').count() <= 2
            && name.split('.').all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
        if valid {
            Ok(Self(name))
        } else {
            Err(format!("invalid table name '{}'", name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TableName::new(s)
    }
}

impl From<TableName> for String {
    fn from(name: TableName) -> Self {
        name.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column layout of the job table read by the fairness queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTable {
    pub name: TableName,
    pub id: &'static str,
    pub tenant_key: &'static str,
    pub queue: &'static str,
    pub priority: &'static str,
    pub run_at: &'static str,
    pub locked_at: &'static str,
    pub locked_by: &'static str,
    pub failed_at: &'static str,
    pub last_error: &'static str,
}

impl JobTable {
    pub fn new(name: TableName) -> Self {
        Self {
            name,
            id: "id",
            tenant_key: "fair_key",
            queue: "queue",
            priority: "priority",
            run_at: "run_at",
            locked_at: "locked_at",
            locked_by: "locked_by",
            failed_at: "failed_at",
            last_error: "last_error",
        }
    }
}
