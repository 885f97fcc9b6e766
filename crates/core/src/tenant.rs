//! Tenant (fair group) identifiers

use crate::error::FairnessError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved tenant key of the row that publishes the current generation.
pub const SENTINEL_TENANT_KEY: &str = "FAIRQ_SYSTEM_PRIMARY";

/// Identifier of a fair-share group.
///
/// Every job carries exactly one tenant key. The key is opaque to the
/// fairness layer; the only constraints are that it is non-empty and is not
/// the reserved [`SENTINEL_TENANT_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(key: impl Into<String>) -> Result<Self, FairnessError> {
        let key = key.into();
        if key.is_empty() {
            return Err(FairnessError::Validation(
                "tenant key must not be empty".to_string(),
            ));
        }
        if key == SENTINEL_TENANT_KEY {
            return Err(FairnessError::Validation(format!(
                "tenant key '{}' is reserved",
                SENTINEL_TENANT_KEY
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantKey {
    type Error = FairnessError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TenantKey::new(s)
    }
}

impl TryFrom<&str> for TenantKey {
    type Error = FairnessError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        TenantKey::new(s)
    }
}

impl From<TenantKey> for String {
    fn from(key: TenantKey) -> Self {
        key.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
