//! Leaderboards as derived projections over registry snapshots.
//!
//! Nothing here is stored. Each call locks every account once, copies the
//! ranking key out and sorts. [`LeaderboardKind::RecentRate`] never computes
//! a rate; it only ranks accounts whose rate was computed within the cache
//! TTL and leaves the rest off the board. Ties break on ascending account id so that
//! two calls over the same state return the same order.

use std::cmp::Reverse;

use accrue_core::constants::MICRO;
use accrue_core::types::{AccountId, Timestamp};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::registry::AccountRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    /// Cumulative XP.
    Xp,
    /// Cumulative mined tokens.
    Mined,
    /// Recently computed mining rates: accounts with a live rate cache only.
    RecentRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account: AccountId,
    pub value: f64,
}

pub(crate) fn project(
    registry: &AccountRegistry,
    kind: LeaderboardKind,
    limit: usize,
    now: Timestamp,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(OrderedFloat<f64>, AccountId)> = registry
        .handles()
        .iter()
        .filter_map(|handle| {
            let record = handle.record.lock();
            let value = match kind {
                LeaderboardKind::Xp => record.account.cumulative_xp as f64,
                LeaderboardKind::Mined => record.account.cumulative_mined as f64 / MICRO as f64,
                LeaderboardKind::RecentRate => record.cached(now)?.rate_per_hour,
            };
            Some((OrderedFloat(value), record.account.id))
        })
        .collect();

    rows.sort_unstable_by_key(|&(value, id)| (Reverse(value), id));
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (value, account))| LeaderboardEntry { rank: i + 1, account, value: value.into_inner() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakdown::{RateBreakdown, ZeroReason};
    use crate::registry::CachedRate;
    use accrue_core::types::Account;

    fn registry(xp: &[(u64, u64)]) -> AccountRegistry {
        let reg = AccountRegistry::new();
        for &(id, xp) in xp {
            let mut account = Account::new(AccountId(id), 0);
            account.cumulative_xp = xp;
            account.cumulative_mined = xp * MICRO / 2;
            reg.insert(account).unwrap();
        }
        reg
    }

    #[test]
    fn sorted_descending_with_id_tiebreak() {
        let reg = registry(&[(3, 50), (1, 50), (2, 90), (4, 10)]);
        let board = project(&reg, LeaderboardKind::Xp, 10, 0);
        let order: Vec<u64> = board.iter().map(|e| e.account.0).collect();
        assert_eq!(order, vec![2, 1, 3, 4]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].value, 90.0);
    }

    #[test]
    fn limit_truncates() {
        let reg = registry(&[(1, 1), (2, 2), (3, 3)]);
        let board = project(&reg, LeaderboardKind::Mined, 2, 0);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].account, AccountId(3));
        assert_eq!(board[0].value, 1.5);
    }

    #[test]
    fn recent_rate_skips_accounts_without_live_cache() {
        let reg = registry(&[(1, 1), (2, 2)]);
        reg.with_record(AccountId(2), |r| {
            let mut breakdown = RateBreakdown::zero(AccountId(2), 90, ZeroReason::VerificationSuspended);
            breakdown.rate_per_hour = 0.5;
            r.cached_rate = Some(CachedRate { breakdown, valid_until: 150 });
        })
        .unwrap();

        let board = project(&reg, LeaderboardKind::RecentRate, 5, 100);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].account, AccountId(2));
        assert_eq!(board[0].value, 0.5);
        assert!(project(&reg, LeaderboardKind::RecentRate, 5, 150).is_empty());
    }
}
