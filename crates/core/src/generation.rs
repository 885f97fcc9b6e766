//! Generation identifiers for published rank snapshots

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logically versioned batch of rank rows.
///
/// Generations are compared numerically; by convention the value is the
/// UNIX epoch second at which the recalculation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(i64);

impl Generation {
    /// Generation written by a freshly created pointer, before any
    /// recalculation has been published.
    pub const INITIAL: Generation = Generation(0);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    /// The generation immediately after this one
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Stamp for a new run: the current time, or one past `current` when
    /// the clock has not moved beyond it.
    pub fn after(current: Generation) -> Self {
        Self::now().max(current.next())
    }
}

impl From<i64> for Generation {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_is_strictly_newer_than_current() {
        let current = Generation::now();
        assert!(Generation::after(current) > current);

        let future = Generation::new(current.value() + 3600);
        assert_eq!(Generation::after(future), future.next());
    }

    #[test]
    fn test_after_uses_clock_when_ahead() {
        let after = Generation::after(Generation::INITIAL);
        assert!(after.value() > 1_600_000_000);
    }

    #[test]
    fn test_next_saturates() {
        assert_eq!(Generation::new(i64::MAX).next(), Generation::new(i64::MAX));
    }
}
