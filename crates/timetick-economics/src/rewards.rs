// crates/timetick-economics/src/rewards.rs
//
// Proportional reward accrual for timekeepers.
//
// A batch's timekeeper pool P goes only to stakers recorded when the previous
// batch closed. Each is weighted by the smaller of its units then and now, so
// neither a mid-interval joiner nor a mid-interval top-up earns for time it
// was not staked:
//   w_i     = min(units_at_boundary_i, units_now_i)
//   share_i = P * w_i / sum(w)
// Shares truncate per staker. The remainder stays in custody as a rounding
// reserve and is tracked here so it can be audited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::{AccountId, TickError};

use crate::staking::StakeRegistry;

/// Result of accruing one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualOutcome {
    /// The pool handed in.
    pub pool: Amount,
    /// Sum of shares credited to stakers. Never exceeds `pool`.
    pub distributed: Amount,
    /// `pool - distributed`, retained in custody.
    pub remainder: Amount,
    /// Number of stakers credited.
    pub recipients: usize,
}

/// Accrual weights for the stakers in `boundary` that are still active.
///
/// Accounts in account order; zero weights are dropped.
pub fn eligible_weights(
    registry: &StakeRegistry,
    boundary: &BTreeMap<AccountId, u64>,
) -> Vec<(AccountId, u64)> {
    boundary
        .iter()
        .filter_map(|(account, units_then)| {
            let units_now = registry.get(account)?.staked_units;
            let weight = (*units_then).min(units_now);
            (weight > 0).then_some((*account, weight))
        })
        .collect()
}

/// Compute every weighted staker's share of `pool` without touching state.
///
/// # Errors
/// Returns `TickError::ArithmeticOverflow` if `pool * weight` overflows u128.
pub fn proportional_shares(
    pool: Amount,
    weights: &[(AccountId, u64)],
) -> Result<Vec<(AccountId, Amount)>, TickError> {
    let total: u128 = weights.iter().map(|(_, w)| *w as u128).sum();
    if pool == 0 || total == 0 {
        return Ok(Vec::new());
    }
    weights
        .iter()
        .map(|(account, weight)| {
            pool.checked_mul(*weight as u128)
                .map(|v| (*account, v / total))
                .ok_or_else(|| {
                    TickError::ArithmeticOverflow(format!(
                        "share of pool {} for {} units overflows",
                        pool, weight
                    ))
                })
        })
        .collect()
}

/// Running accrual ledger: what has been accrued, claimed, and left over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardAccrual {
    /// Cumulative rounding remainder retained in custody.
    undistributed: Amount,
    /// Cumulative rewards credited to stakers.
    total_accrued: Amount,
    /// Cumulative rewards paid out by claims.
    total_claimed: Amount,
}

impl RewardAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `pool` to the weighted stakers.
    ///
    /// Shares are computed up front, so an overflow leaves every record
    /// unchanged.
    pub fn accrue(
        &mut self,
        pool: Amount,
        registry: &mut StakeRegistry,
        weights: &[(AccountId, u64)],
    ) -> Result<AccrualOutcome, TickError> {
        let shares = proportional_shares(pool, weights)?;
        let distributed: Amount = shares.iter().map(|(_, share)| *share).sum();
        let remainder = pool - distributed;

        for (account, share) in &shares {
            registry.credit_rewards(account, *share);
        }
        self.undistributed = self.undistributed.saturating_add(remainder);
        self.total_accrued = self.total_accrued.saturating_add(distributed);

        Ok(AccrualOutcome {
            pool,
            distributed,
            remainder,
            recipients: shares.len(),
        })
    }

    /// Record a claim payout.
    pub fn record_claim(&mut self, amount: Amount) {
        self.total_claimed = self.total_claimed.saturating_add(amount);
    }

    pub fn undistributed(&self) -> Amount {
        self.undistributed
    }

    pub fn total_accrued(&self) -> Amount {
        self.total_accrued
    }

    pub fn total_claimed(&self) -> Amount {
        self.total_claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: Amount = 3_600;

    fn registry(stakes: &[(u8, u64)]) -> StakeRegistry {
        let mut registry = StakeRegistry::new(UNIT, 1);
        for (id, units) in stakes {
            registry.stake(AccountId::repeat(*id), *units, 0).unwrap();
        }
        registry
    }

    fn accrue_all(
        accrual: &mut RewardAccrual,
        pool: Amount,
        reg: &mut StakeRegistry,
    ) -> AccrualOutcome {
        let weights = eligible_weights(reg, &reg.unit_snapshot());
        accrual.accrue(pool, reg, &weights).unwrap()
    }

    #[test]
    fn test_equal_stakes_split_evenly() {
        let mut reg = registry(&[(1, 1), (2, 1)]);
        let mut accrual = RewardAccrual::new();
        let outcome = accrue_all(&mut accrual, 2_520, &mut reg);

        assert_eq!(outcome.distributed, 2_520);
        assert_eq!(outcome.remainder, 0);
        assert_eq!(outcome.recipients, 2);
        assert_eq!(reg.get(&AccountId::repeat(1)).unwrap().unclaimed_rewards, 1_260);
        assert_eq!(reg.get(&AccountId::repeat(2)).unwrap().unclaimed_rewards, 1_260);
    }

    #[test]
    fn test_weighted_by_units() {
        let mut reg = registry(&[(1, 3), (2, 1)]);
        let mut accrual = RewardAccrual::new();
        accrue_all(&mut accrual, 1_000, &mut reg);
        assert_eq!(reg.get(&AccountId::repeat(1)).unwrap().unclaimed_rewards, 750);
        assert_eq!(reg.get(&AccountId::repeat(2)).unwrap().unclaimed_rewards, 250);
    }

    #[test]
    fn test_truncation_remainder_retained() {
        let mut reg = registry(&[(1, 1), (2, 1), (3, 1)]);
        let mut accrual = RewardAccrual::new();
        let outcome = accrue_all(&mut accrual, 100, &mut reg);

        assert_eq!(outcome.distributed, 99);
        assert_eq!(outcome.remainder, 1);
        assert_eq!(accrual.undistributed(), 1);
        assert_eq!(accrual.total_accrued(), 99);
    }

    #[test]
    fn test_no_weights_keeps_whole_pool() {
        let mut reg = registry(&[(1, 1)]);
        let mut accrual = RewardAccrual::new();
        let outcome = accrual.accrue(500, &mut reg, &[]).unwrap();
        assert_eq!(outcome.distributed, 0);
        assert_eq!(outcome.remainder, 500);
        assert_eq!(reg.total_unclaimed(), 0);
    }

    #[test]
    fn test_joiner_after_boundary_not_weighted() {
        let mut reg = registry(&[(1, 1)]);
        let boundary = reg.unit_snapshot();
        reg.stake(AccountId::repeat(2), 5, 10).unwrap();

        let weights = eligible_weights(&reg, &boundary);
        assert_eq!(weights, vec![(AccountId::repeat(1), 1)]);
    }

    #[test]
    fn test_top_up_after_boundary_uses_boundary_units() {
        let mut reg = registry(&[(1, 1), (2, 1)]);
        let boundary = reg.unit_snapshot();
        reg.stake(AccountId::repeat(1), 9, 10).unwrap();

        let mut accrual = RewardAccrual::new();
        let weights = eligible_weights(&reg, &boundary);
        accrual.accrue(1_000, &mut reg, &weights).unwrap();
        assert_eq!(reg.get(&AccountId::repeat(1)).unwrap().unclaimed_rewards, 500);
        assert_eq!(reg.get(&AccountId::repeat(2)).unwrap().unclaimed_rewards, 500);
    }

    #[test]
    fn test_overflow_leaves_records_untouched() {
        let mut reg = registry(&[(1, 2), (2, 1)]);
        let mut accrual = RewardAccrual::new();
        let weights = eligible_weights(&reg, &reg.unit_snapshot());
        assert!(accrual.accrue(u128::MAX, &mut reg, &weights).is_err());
        assert_eq!(reg.total_unclaimed(), 0);
        assert_eq!(accrual.undistributed(), 0);
    }

    #[test]
    fn test_record_claim() {
        let mut accrual = RewardAccrual::new();
        accrual.record_claim(10);
        accrual.record_claim(5);
        assert_eq!(accrual.total_claimed(), 15);
    }
}
