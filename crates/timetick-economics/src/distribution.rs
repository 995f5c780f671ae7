// crates/timetick-economics/src/distribution.rs
//
// Distribution split for each minted batch.
//
// A batch is divided among three destinations:
//   1. Treasury (development fund)
//   2. Stability reserve
//   3. Timekeeper pool, accrued to stakers in proportion to their stake
//
// Which split applies depends on whether any staker recorded at the previous
// batch boundary is still staked. Reserve and timekeeper shares are truncated; the
// treasury takes whatever is left so no tick is ever lost to rounding.

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::TickError;

use crate::params::{DistributionSplit, BPS_DENOMINATOR};

/// The result of splitting one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSplit {
    /// Ticks credited to the treasury, including the rounding remainder.
    pub treasury: Amount,
    /// Ticks credited to the stability reserve.
    pub reserve: Amount,
    /// Ticks routed to the timekeeper accrual pool.
    pub timekeepers: Amount,
}

impl FundSplit {
    pub fn total(&self) -> Amount {
        self.treasury + self.reserve + self.timekeepers
    }
}

/// Truncating `amount * bps / 10_000`.
fn bps_share(amount: Amount, bps: u32) -> Result<Amount, TickError> {
    amount
        .checked_mul(bps as u128)
        .map(|v| v / BPS_DENOMINATOR as u128)
        .ok_or_else(|| {
            TickError::ArithmeticOverflow(format!("{} * {} bps overflows", amount, bps))
        })
}

/// Pick the split for a batch.
///
/// `eligible_timekeepers` counts stakers that were recorded when the previous
/// batch closed and are still staked after this batch's expiry sweep. Stakers
/// who joined mid-interval are not counted, so they never switch the split
/// on their own, and no pool is created when nobody is left to accrue it.
pub fn select_split<'a>(
    staker_split: &'a DistributionSplit,
    no_staker_split: &'a DistributionSplit,
    eligible_timekeepers: usize,
) -> &'a DistributionSplit {
    if eligible_timekeepers > 0 {
        staker_split
    } else {
        no_staker_split
    }
}

/// Split `amount` according to `split`.
///
/// # Errors
/// Returns `TickError::ArithmeticOverflow` if `amount * bps` overflows u128.
pub fn split_emission(amount: Amount, split: &DistributionSplit) -> Result<FundSplit, TickError> {
    let reserve = bps_share(amount, split.reserve_bps)?;
    let timekeepers = bps_share(amount, split.timekeeper_bps)?;
    // reserve + timekeepers <= amount because their bps sum to at most 10_000.
    let treasury = amount - reserve - timekeepers;
    Ok(FundSplit {
        treasury,
        reserve,
        timekeepers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use timetick_core::token::TICKS_PER_TTB;

    #[test]
    fn test_no_staker_split_70_30() {
        let split = split_emission(7_200, &DistributionSplit::without_timekeepers()).unwrap();
        assert_eq!(split.treasury, 5_040);
        assert_eq!(split.reserve, 2_160);
        assert_eq!(split.timekeepers, 0);
    }

    #[test]
    fn test_staker_split_70_20_10() {
        let amount = 3_600 * TICKS_PER_TTB;
        let split = split_emission(amount, &DistributionSplit::with_timekeepers()).unwrap();
        assert_eq!(split.timekeepers, 2_520 * TICKS_PER_TTB);
        assert_eq!(split.treasury, 720 * TICKS_PER_TTB);
        assert_eq!(split.reserve, 360 * TICKS_PER_TTB);
        assert_eq!(split.total(), amount);
    }

    #[test]
    fn test_remainder_goes_to_treasury() {
        // 7 * 3000 / 10000 = 2.1 -> 2 to the reserve, the rest to treasury.
        let split = split_emission(7, &DistributionSplit::without_timekeepers()).unwrap();
        assert_eq!(split.reserve, 2);
        assert_eq!(split.treasury, 5);
        assert_eq!(split.total(), 7);
    }

    #[test]
    fn test_zero_amount() {
        let split = split_emission(0, &DistributionSplit::with_timekeepers()).unwrap();
        assert_eq!(split, FundSplit::default());
    }

    #[test]
    fn test_select_split_requires_eligible_timekeepers() {
        let with = DistributionSplit::with_timekeepers();
        let without = DistributionSplit::without_timekeepers();
        assert_eq!(*select_split(&with, &without, 0), without);
        assert_eq!(*select_split(&with, &without, 2), with);
    }

    #[test]
    fn test_overflow_is_reported() {
        assert!(matches!(
            split_emission(u128::MAX, &DistributionSplit::with_timekeepers()),
            Err(TickError::ArithmeticOverflow(_))
        ));
    }
}
