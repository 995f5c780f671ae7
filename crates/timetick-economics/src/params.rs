// crates/timetick-economics/src/params.rs
//
// Emission and staking parameters.
//
// Defaults match the production deployment:
// - 1 TTB minted per elapsed second
// - Batches at most once per hour
// - Stake unit = one hour of emission (3,600 TTB)
// - Unstake delay: 3 days; renewal period: 180 days
// - With timekeepers: 70% timekeepers / 20% treasury / 10% reserve
// - Without timekeepers: 70% treasury / 30% reserve

use serde::{Deserialize, Serialize};

use timetick_core::token::{Amount, SECONDS_PER_DAY, SECONDS_PER_HOUR, TICKS_PER_TTB};
use timetick_core::TickError;

/// Denominator for every fraction expressed in basis points.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// How a minted amount is divided among treasury, reserve, and timekeepers,
/// in basis points. The three shares must sum to `BPS_DENOMINATOR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSplit {
    pub treasury_bps: u32,
    pub reserve_bps: u32,
    pub timekeeper_bps: u32,
}

impl DistributionSplit {
    /// Split used once timekeepers were active at the previous batch boundary.
    pub const fn with_timekeepers() -> Self {
        Self {
            treasury_bps: 2_000,
            reserve_bps: 1_000,
            timekeeper_bps: 7_000,
        }
    }

    /// Split used while there are no timekeepers.
    pub const fn without_timekeepers() -> Self {
        Self {
            treasury_bps: 7_000,
            reserve_bps: 3_000,
            timekeeper_bps: 0,
        }
    }

    pub fn total_bps(&self) -> u32 {
        self.treasury_bps + self.reserve_bps + self.timekeeper_bps
    }
}

/// Tunable parameters of the engine. Immutable after construction except
/// `minimum_stake_units`, which the owner may change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionParams {
    /// Ticks minted per elapsed second.
    pub emission_rate_per_second: Amount,
    /// Minimum seconds between two batches.
    pub batch_interval_secs: u64,
    /// The indivisible quantum of stake, in ticks.
    pub stake_unit: Amount,
    /// Floor on new stakes, in units.
    pub minimum_stake_units: u64,
    /// Seconds between an unstake request and the earliest unstake.
    pub unstake_delay_secs: u64,
    /// Maximum seconds a stake may go unrenewed before it expires.
    pub renewal_period_secs: u64,
    pub staker_split: DistributionSplit,
    pub no_staker_split: DistributionSplit,
}

impl Default for EmissionParams {
    fn default() -> Self {
        Self {
            emission_rate_per_second: TICKS_PER_TTB,
            batch_interval_secs: SECONDS_PER_HOUR,
            stake_unit: SECONDS_PER_HOUR as u128 * TICKS_PER_TTB,
            minimum_stake_units: 1,
            unstake_delay_secs: 3 * SECONDS_PER_DAY,
            renewal_period_secs: 180 * SECONDS_PER_DAY,
            staker_split: DistributionSplit::with_timekeepers(),
            no_staker_split: DistributionSplit::without_timekeepers(),
        }
    }
}

impl EmissionParams {
    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `TickError::InvalidConfig` for a zero rate, unit, or interval,
    /// a zero minimum stake, splits that do not sum to 10,000 bps, or a
    /// no-staker split that reserves a timekeeper share.
    pub fn validate(&self) -> Result<(), TickError> {
        if self.emission_rate_per_second == 0 {
            return Err(TickError::InvalidConfig(
                "emission_rate_per_second must be positive".to_string(),
            ));
        }
        if self.batch_interval_secs == 0 {
            return Err(TickError::InvalidConfig(
                "batch_interval_secs must be positive".to_string(),
            ));
        }
        if self.stake_unit == 0 {
            return Err(TickError::InvalidConfig(
                "stake_unit must be positive".to_string(),
            ));
        }
        if self.minimum_stake_units == 0 {
            return Err(TickError::InvalidConfig(
                "minimum_stake_units must be at least 1".to_string(),
            ));
        }
        for (name, split) in [
            ("staker_split", &self.staker_split),
            ("no_staker_split", &self.no_staker_split),
        ] {
            if split.total_bps() != BPS_DENOMINATOR {
                return Err(TickError::InvalidConfig(format!(
                    "{} sums to {} bps, expected {}",
                    name,
                    split.total_bps(),
                    BPS_DENOMINATOR
                )));
            }
        }
        if self.no_staker_split.timekeeper_bps != 0 {
            return Err(TickError::InvalidConfig(
                "no_staker_split cannot allocate a timekeeper share".to_string(),
            ));
        }
        Ok(())
    }
}
