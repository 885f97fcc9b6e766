//! Rank formula and rank rows
//!
//! A tenant's rank is a signed fairness score: higher is more favored. A
//! tenant with nothing in flight always scores `0`, so idle-but-queued
//! tenants float above every tenant that is already consuming capacity.

use crate::generation::Generation;
use crate::tenant::TenantKey;
use serde::{Deserialize, Serialize};

/// Rank carried by the generation pointer row. Far below any score a real
/// tenant can reach, so the sentinel can never appear in a top-K of tenants.
pub const SENTINEL_RANK: i64 = -10_000_000_000;

/// Penalty per busy job.
const BUSY_WEIGHT: i64 = 100;

/// Busy and waiting job counts for one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TenantStats {
    /// Jobs currently locked by a worker.
    pub busy: u64,
    /// Jobs not locked and not permanently failed.
    pub waiting: u64,
}

impl TenantStats {
    pub fn new(busy: u64, waiting: u64) -> Self {
        Self { busy, waiting }
    }

    pub fn rank(&self) -> i64 {
        compute_rank(self.busy, self.waiting)
    }
}

/// Fairness score for a tenant.
///
/// `-100 * busy`, minus one more when the tenant is busy and still has work
/// waiting. Zero whenever `busy == 0`. Clamped above [`SENTINEL_RANK`].
pub fn compute_rank(busy: u64, waiting: u64) -> i64 {
    if busy == 0 {
        return 0;
    }

    let busy = i64::try_from(busy).unwrap_or(i64::MAX);
    let mut rank = busy.saturating_mul(BUSY_WEIGHT).saturating_neg();
    if waiting > 0 {
        rank = rank.saturating_sub(1);
    }
    rank.max(SENTINEL_RANK + 1)
}

/// A computed rank, without the generation it was published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub tenant_key: TenantKey,
    pub busy: u64,
    pub waiting: u64,
    pub rank: i64,
}

impl RankEntry {
    pub fn from_stats(tenant_key: TenantKey, stats: TenantStats) -> Self {
        Self {
            tenant_key,
            busy: stats.busy,
            waiting: stats.waiting,
            rank: stats.rank(),
        }
    }

    pub fn with_generation(self, generation: Generation) -> RankRow {
        RankRow {
            tenant_key: self.tenant_key,
            busy: self.busy,
            waiting: self.waiting,
            rank: self.rank,
            generation,
        }
    }
}

/// A tenant's fairness state within one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRow {
    pub tenant_key: TenantKey,
    pub busy: u64,
    pub waiting: u64,
    pub rank: i64,
    pub generation: Generation,
}

impl RankRow {
    pub fn into_entry(self) -> RankEntry {
        RankEntry {
            tenant_key: self.tenant_key,
            busy: self.busy,
            waiting: self.waiting,
            rank: self.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_idle_tenant_scores_zero() {
        assert_eq!(compute_rank(0, 0), 0);
        assert_eq!(compute_rank(0, 1), 0);
        assert_eq!(compute_rank(0, 10_000), 0);
    }

    #[test]
    fn test_busy_with_waiting_gets_extra_penalty() {
        assert_eq!(compute_rank(1, 0), -100);
        assert_eq!(compute_rank(1, 1), -101);
        assert_eq!(compute_rank(3, 7), -301);
    }

    #[test]
    fn test_mixed_tenant_scenario() {
        let cases = [
            ("A", 2, 1, -201),
            ("B", 1, 1, -101),
            ("C", 0, 1, 0),
            ("D", 2, 0, -200),
            ("E", 0, 4, 0),
        ];

        for (tenant, busy, waiting, expected) in cases {
            let entry = RankEntry::from_stats(
                TenantKey::new(tenant).unwrap(),
                TenantStats::new(busy, waiting),
            );
            assert_eq!(entry.rank, expected, "tenant {}", tenant);
        }
    }

    #[test]
    fn test_rank_never_reaches_sentinel() {
        assert!(compute_rank(u64::MAX, 1) > SENTINEL_RANK);
        assert!(compute_rank(200_000_000, 0) > SENTINEL_RANK);
    }

    #[test]
    fn test_entry_generation_round_trip() {
        let entry = RankEntry::from_stats(TenantKey::new("t1").unwrap(), TenantStats::new(2, 0));
        let row = entry.clone().with_generation(Generation::new(1_700_000_000));

        assert_eq!(row.generation.value(), 1_700_000_000);
        assert_eq!(row.into_entry(), entry);
    }

    proptest! {
        #[test]
        fn rank_is_non_increasing_in_busy(busy in 0u64..1_000_000, waiting in 0u64..1_000_000) {
            prop_assert!(compute_rank(busy + 1, waiting) <= compute_rank(busy, waiting));
        }

        #[test]
        fn rank_is_zero_without_busy_jobs(waiting in any::<u64>()) {
            prop_assert_eq!(compute_rank(0, waiting), 0);
        }

        #[test]
        fn rank_is_never_positive(busy in any::<u64>(), waiting in any::<u64>()) {
            prop_assert!(compute_rank(busy, waiting) <= 0);
        }
    }
}
