// crates/timetick-economics/src/supply.rs
//
// Supply validation against the genesis-anchored emission formula.
//
//   expected = (now - genesis_time) * rate
//   diff     = expected - current_supply
//
// A positive diff is a shortfall (missed or delayed batches) that the
// validated batch mints through the normal distribution path. A negative diff
// means over-issuance; it is never burned, only reported as invalid.

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::TickError;

use crate::emission::expected_supply;

/// Observable result of a supply check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyReport {
    /// False when the ledger has issued more than the formula allows.
    pub valid: bool,
    pub total_elapsed_seconds: u64,
    pub expected_supply: Amount,
    pub current_supply: Amount,
    /// `expected_supply - current_supply`, signed.
    pub diff: i128,
}

impl SupplyReport {
    /// Amount the validated batch should mint: the shortfall, or zero.
    pub fn shortfall(&self) -> Amount {
        self.expected_supply.saturating_sub(self.current_supply)
    }

    /// Amount issued beyond the formula, or zero.
    pub fn excess(&self) -> Amount {
        self.current_supply.saturating_sub(self.expected_supply)
    }
}

/// Compare `current_supply` with the formula at `now`.
///
/// # Errors
/// `ArithmeticOverflow` if the expected supply or the signed difference does
/// not fit.
pub fn validate_supply(
    genesis_time: u64,
    now: u64,
    rate: Amount,
    current_supply: Amount,
) -> Result<SupplyReport, TickError> {
    let expected = expected_supply(genesis_time, now, rate)?;
    let signed = |v: Amount| {
        i128::try_from(v).map_err(|_| {
            TickError::ArithmeticOverflow(format!("supply {} exceeds signed range", v))
        })
    };
    let diff = signed(expected)? - signed(current_supply)?;
    Ok(SupplyReport {
        valid: diff >= 0,
        total_elapsed_seconds: now.saturating_sub(genesis_time),
        expected_supply: expected,
        current_supply,
        diff,
    })
}
