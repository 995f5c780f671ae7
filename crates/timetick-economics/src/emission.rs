// crates/timetick-economics/src/emission.rs
//
// Time-linked emission schedule.
//
// TTB is minted at a fixed rate per elapsed real-world second:
//   batch amount    = (now - last_batch_time) * rate
//   expected supply = (now - genesis_time) * rate
//
// A batch may only run once `batch_interval` seconds have passed since the
// previous one. The schedule never reads the clock itself; callers pass `now`.

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::TickError;

/// Amount due for `elapsed` seconds at `rate` ticks per second.
///
/// # Errors
/// Returns `TickError::ArithmeticOverflow` if the product does not fit in u128.
pub fn batch_emission(elapsed: u64, rate: Amount) -> Result<Amount, TickError> {
    (elapsed as u128).checked_mul(rate).ok_or_else(|| {
        TickError::ArithmeticOverflow(format!(
            "emission for {}s at rate {} overflows",
            elapsed, rate
        ))
    })
}

/// Total supply the formula expects at `now` for a chain started at `genesis_time`.
///
/// Times before genesis yield zero.
pub fn expected_supply(genesis_time: u64, now: u64, rate: Amount) -> Result<Amount, TickError> {
    batch_emission(now.saturating_sub(genesis_time), rate)
}

/// A batch the schedule has agreed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueBatch {
    /// Seconds covered by this batch.
    pub elapsed: u64,
    /// Ticks to mint.
    pub amount: Amount,
}

/// Genesis anchor and batch cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSchedule {
    genesis_time: u64,
    last_batch_time: u64,
    batch_interval: u64,
}

impl BatchSchedule {
    /// Start a schedule at `genesis_time`. The first batch cursor is genesis.
    pub fn new(genesis_time: u64, batch_interval: u64) -> Self {
        Self {
            genesis_time,
            last_batch_time: genesis_time,
            batch_interval,
        }
    }

    pub fn genesis_time(&self) -> u64 {
        self.genesis_time
    }

    pub fn last_batch_time(&self) -> u64 {
        self.last_batch_time
    }

    pub fn batch_interval(&self) -> u64 {
        self.batch_interval
    }

    /// Seconds elapsed since the last batch (zero if the clock is behind it).
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_batch_time)
    }

    /// Check the interval guard and compute the amount due at `now`.
    ///
    /// Does not move the cursor; call `advance` once the batch is committed.
    ///
    /// # Errors
    /// Returns `TickError::BatchNotDue` if fewer than `batch_interval` seconds
    /// have passed since the last batch.
    pub fn due(&self, now: u64, rate: Amount) -> Result<DueBatch, TickError> {
        let elapsed = self.elapsed(now);
        if elapsed < self.batch_interval {
            return Err(TickError::BatchNotDue {
                elapsed,
                interval: self.batch_interval,
            });
        }
        Ok(DueBatch {
            elapsed,
            amount: batch_emission(elapsed, rate)?,
        })
    }

    /// Move the cursor to `now`. The cursor never moves backwards.
    pub fn advance(&mut self, now: u64) {
        self.last_batch_time = self.last_batch_time.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timetick_core::token::TICKS_PER_TTB;

    const T0: u64 = 1_700_000_000;

    #[test]
    fn test_batch_emission_exact() {
        assert_eq!(batch_emission(7_200, 1).unwrap(), 7_200);
        assert_eq!(
            batch_emission(3_600, TICKS_PER_TTB).unwrap(),
            3_600 * TICKS_PER_TTB
        );
    }

    #[test]
    fn test_batch_emission_overflow() {
        assert!(matches!(
            batch_emission(u64::MAX, u128::MAX),
            Err(TickError::ArithmeticOverflow(_))
        ));
    }

    #[test]
    fn test_expected_supply_before_genesis_is_zero() {
        assert_eq!(expected_supply(T0, T0 - 10, TICKS_PER_TTB).unwrap(), 0);
    }

    #[test]
    fn test_due_rejects_early_batch() {
        let schedule = BatchSchedule::new(T0, 3_600);
        let err = schedule.due(T0 + 3_599, 1).unwrap_err();
        assert_eq!(
            err,
            TickError::BatchNotDue {
                elapsed: 3_599,
                interval: 3_600
            }
        );
    }

    #[test]
    fn test_due_exactly_at_interval() {
        let schedule = BatchSchedule::new(T0, 3_600);
        let due = schedule.due(T0 + 3_600, 1).unwrap();
        assert_eq!(due.elapsed, 3_600);
        assert_eq!(due.amount, 3_600);
    }

    #[test]
    fn test_due_covers_all_elapsed_time() {
        // A late batch catches up on everything since the cursor.
        let schedule = BatchSchedule::new(T0, 3_600);
        let due = schedule.due(T0 + 365 * 86_400, 1).unwrap();
        assert_eq!(due.amount, 31_536_000);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut schedule = BatchSchedule::new(T0, 3_600);
        schedule.advance(T0 + 7_200);
        schedule.advance(T0 + 100);
        assert_eq!(schedule.last_batch_time(), T0 + 7_200);
    }
}
