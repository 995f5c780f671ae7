// crates/timetick-core/src/token.rs
//
// TTB (TimeTick) amount type and unit constants.
//
// The smallest unit of TTB is the "tick". 1 TTB = 10^18 ticks. All internal
// accounting uses ticks so that per-second emission never loses precision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of ticks in one TTB. 1 TTB = 10^18 ticks.
pub const TICKS_PER_TTB: u128 = 1_000_000_000_000_000_000;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: u64 = 3_600;

/// Seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Type alias for ticks, the unit every balance and emission is counted in.
pub type Amount = u128;

/// A TTB amount.
///
/// Wraps an amount in ticks for display in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ttb {
    /// Amount in ticks (1 TTB = 10^18 ticks).
    pub ticks: Amount,
}

impl Ttb {
    /// Create an amount from a tick value.
    pub fn from_ticks(ticks: Amount) -> Self {
        Self { ticks }
    }
}

impl fmt::Display for Ttb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.ticks / TICKS_PER_TTB;
        let frac = self.ticks % TICKS_PER_TTB;
        if frac == 0 {
            write!(f, "{} TTB", whole)
        } else {
            // Up to 18 decimal places, trailing zeros trimmed
            let frac_str = format!("{:018}", frac);
            let trimmed = frac_str.trim_end_matches('0');
            write!(f, "{}.{} TTB", whole, trimmed)
        }
    }
}
