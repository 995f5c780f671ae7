// crates/timetick-economics/src/staking.rs
//
// Stake registry: per-account stake records and aggregate totals.
//
// Lifecycle of a stake:
//   stake -> (renew)* -> request_unstake -> [unstake delay] -> unstake
//                          \-> cancel_unstake
// A stake that goes longer than the renewal period without a renewal is
// force-unstaked by the expiry sweep the next time a batch or staker
// operation touches the registry. There is no background timer.
//
// The registry only does bookkeeping. Moving principal in and out of custody
// on the balance ledger is the engine's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::{AccountId, TickError};

/// Stake state of one account.
///
/// Invariant: `staked_amount == staked_units * stake_unit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerRecord {
    /// Principal held in custody, in ticks.
    pub staked_amount: Amount,
    /// Principal in stake units.
    pub staked_units: u64,
    /// Time of the most recent `stake` call.
    pub last_stake_time: u64,
    /// If set, the time unstaking was requested. Funds stay locked until the
    /// unstake delay has elapsed from this time.
    pub unstake_requested_at: Option<u64>,
    /// Units that `unstake` will release once the delay has elapsed.
    pub pending_unstake_units: u64,
    /// Time of the most recent renewal (or of activation).
    pub last_renewal_time: u64,
    /// Accrued rewards not yet claimed, in ticks.
    pub unclaimed_rewards: Amount,
}

impl StakerRecord {
    /// True while the record holds principal and counts as a timekeeper.
    pub fn is_active(&self) -> bool {
        self.staked_units > 0
    }

    fn is_vacant(&self) -> bool {
        !self.is_active() && self.unclaimed_rewards == 0
    }

    fn clear_stake(&mut self) {
        self.staked_amount = 0;
        self.staked_units = 0;
        self.unstake_requested_at = None;
        self.pending_unstake_units = 0;
    }
}

/// A stake removed by the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredStake {
    pub account: AccountId,
    pub units: u64,
    /// Principal to return to the account.
    pub amount: Amount,
    /// Rewards left claimable on the record.
    pub unclaimed_rewards: Amount,
}

/// Convert a tick amount to whole stake units.
///
/// # Errors
/// Returns `TickError::NonWholeUnit` if `amount` is not an exact multiple of
/// `stake_unit`, or does not fit in a u64 unit count.
pub fn whole_units(amount: Amount, stake_unit: Amount) -> Result<u64, TickError> {
    if stake_unit == 0 || amount % stake_unit != 0 {
        return Err(TickError::NonWholeUnit {
            amount,
            unit: stake_unit,
        });
    }
    u64::try_from(amount / stake_unit).map_err(|_| TickError::NonWholeUnit {
        amount,
        unit: stake_unit,
    })
}

/// Tracks every staker record plus the aggregate totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeRegistry {
    records: BTreeMap<AccountId, StakerRecord>,
    stake_unit: Amount,
    minimum_stake_units: u64,
    total_staked: Amount,
    total_units: u64,
    staker_count: usize,
}

impl StakeRegistry {
    /// Create an empty registry.
    pub fn new(stake_unit: Amount, minimum_stake_units: u64) -> Self {
        Self {
            records: BTreeMap::new(),
            stake_unit,
            minimum_stake_units,
            total_staked: 0,
            total_units: 0,
            staker_count: 0,
        }
    }

    pub fn stake_unit(&self) -> Amount {
        self.stake_unit
    }

    pub fn minimum_stake_units(&self) -> u64 {
        self.minimum_stake_units
    }

    /// Change the floor for future stakes. Existing stakes are untouched.
    pub fn set_minimum_stake_units(&mut self, units: u64) -> Result<(), TickError> {
        if units == 0 {
            return Err(TickError::InvalidState(
                "Minimum stake must be at least one unit".to_string(),
            ));
        }
        self.minimum_stake_units = units;
        Ok(())
    }

    fn amount_for(&self, units: u64) -> Result<Amount, TickError> {
        (units as u128).checked_mul(self.stake_unit).ok_or_else(|| {
            TickError::ArithmeticOverflow(format!("{} stake units overflow", units))
        })
    }

    /// Validate a new stake of `amount` ticks and return its unit count.
    ///
    /// Pure check; nothing is recorded.
    ///
    /// # Errors
    /// `NonWholeUnit` for a non-multiple, `BelowMinimumStake` below the floor.
    pub fn check_stake(&self, amount: Amount) -> Result<u64, TickError> {
        let units = whole_units(amount, self.stake_unit)?;
        if units < self.minimum_stake_units {
            return Err(TickError::BelowMinimumStake {
                units,
                minimum: self.minimum_stake_units,
            });
        }
        Ok(units)
    }

    /// Record a stake that `check_stake` accepted.
    ///
    /// Creates the record on first stake. A record that was inactive starts a
    /// fresh renewal period.
    pub fn stake(&mut self, account: AccountId, units: u64, now: u64) -> Result<Amount, TickError> {
        let amount = self.amount_for(units)?;
        let total_staked = self.total_staked.checked_add(amount).ok_or_else(|| {
            TickError::ArithmeticOverflow("total staked overflows".to_string())
        })?;
        let total_units = self.total_units.checked_add(units).ok_or_else(|| {
            TickError::ArithmeticOverflow("total stake units overflow".to_string())
        })?;

        let record = self.records.entry(account).or_default();
        if !record.is_active() {
            record.last_renewal_time = now;
            self.staker_count += 1;
        }
        record.staked_units += units;
        record.staked_amount += amount;
        record.last_stake_time = now;

        self.total_staked = total_staked;
        self.total_units = total_units;
        Ok(amount)
    }

    fn active_record_mut(&mut self, account: &AccountId) -> Result<&mut StakerRecord, TickError> {
        self.records
            .get_mut(account)
            .filter(|r| r.is_active())
            .ok_or_else(|| TickError::NotFound(format!("No active stake for {}", account)))
    }

    /// Start the unstake timer for `amount` ticks of principal.
    ///
    /// A second request replaces the first and restarts the timer.
    ///
    /// # Errors
    /// `NotFound` without an active stake, `NonWholeUnit` for a non-multiple,
    /// `InvalidState` for zero or for more than is staked.
    pub fn request_unstake(
        &mut self,
        account: &AccountId,
        amount: Amount,
        now: u64,
    ) -> Result<u64, TickError> {
        let units = whole_units(amount, self.stake_unit)?;
        let record = self.active_record_mut(account)?;
        if units == 0 {
            return Err(TickError::InvalidState(
                "Unstake amount must be positive".to_string(),
            ));
        }
        if units > record.staked_units {
            return Err(TickError::InvalidState(format!(
                "Requested {} units but only {} are staked",
                units, record.staked_units
            )));
        }
        record.unstake_requested_at = Some(now);
        record.pending_unstake_units = units;
        Ok(units)
    }

    /// Clear a pending unstake request. Nothing else changes.
    pub fn cancel_unstake(&mut self, account: &AccountId) -> Result<(), TickError> {
        let record = self.active_record_mut(account)?;
        if record.unstake_requested_at.is_none() {
            return Err(TickError::InvalidState(
                "No pending unstake request".to_string(),
            ));
        }
        record.unstake_requested_at = None;
        record.pending_unstake_units = 0;
        Ok(())
    }

    /// Release the pending principal once `delay` seconds have passed since
    /// the request.
    ///
    /// Returns `(units, amount)` released. Releasing everything zeroes the
    /// stake portion of the record and removes it from the aggregates.
    ///
    /// # Errors
    /// `UnstakeNotReady` without a pending request or before the delay elapsed.
    pub fn unstake(
        &mut self,
        account: &AccountId,
        now: u64,
        delay: u64,
    ) -> Result<(u64, Amount), TickError> {
        let stake_unit = self.stake_unit;
        let record = self
            .records
            .get_mut(account)
            .filter(|r| r.is_active())
            .ok_or_else(|| {
                TickError::UnstakeNotReady(format!("No active stake for {}", account))
            })?;
        let requested_at = record.unstake_requested_at.ok_or_else(|| {
            TickError::UnstakeNotReady("No pending unstake request".to_string())
        })?;
        let waited = now.saturating_sub(requested_at);
        if waited < delay {
            return Err(TickError::UnstakeNotReady(format!(
                "{}s of {}s unstake delay elapsed",
                waited, delay
            )));
        }

        let units = record.pending_unstake_units.min(record.staked_units);
        let amount = units as u128 * stake_unit;
        record.staked_units -= units;
        record.staked_amount -= amount;
        record.unstake_requested_at = None;
        record.pending_unstake_units = 0;
        let emptied = !record.is_active();
        if emptied {
            record.clear_stake();
        }

        self.total_units -= units;
        self.total_staked -= amount;
        if emptied {
            self.staker_count -= 1;
        }
        self.prune(account);
        Ok((units, amount))
    }

    /// Reset the renewal timer of an active stake.
    pub fn renew(&mut self, account: &AccountId, now: u64) -> Result<(), TickError> {
        let record = self.active_record_mut(account)?;
        record.last_renewal_time = now;
        Ok(())
    }

    /// Force-unstake every record whose renewal lapsed more than
    /// `renewal_period` seconds ago.
    ///
    /// Principal is returned by the caller; accrued rewards stay on the
    /// record as claimable.
    pub fn sweep_expired(&mut self, now: u64, renewal_period: u64) -> Vec<ExpiredStake> {
        let mut expired = Vec::new();
        for (account, record) in self.records.iter_mut() {
            if record.is_active() && now.saturating_sub(record.last_renewal_time) > renewal_period {
                expired.push(ExpiredStake {
                    account: *account,
                    units: record.staked_units,
                    amount: record.staked_amount,
                    unclaimed_rewards: record.unclaimed_rewards,
                });
                record.clear_stake();
            }
        }

        for stake in &expired {
            self.total_units -= stake.units;
            self.total_staked -= stake.amount;
            self.staker_count -= 1;
        }
        self.records.retain(|_, r| !r.is_vacant());
        expired
    }

    /// Add accrued rewards to a record.
    pub(crate) fn credit_rewards(&mut self, account: &AccountId, amount: Amount) {
        if let Some(record) = self.records.get_mut(account) {
            record.unclaimed_rewards = record.unclaimed_rewards.saturating_add(amount);
        }
    }

    /// Zero and return an account's unclaimed rewards.
    pub fn take_rewards(&mut self, account: &AccountId) -> Amount {
        let amount = match self.records.get_mut(account) {
            Some(record) => std::mem::take(&mut record.unclaimed_rewards),
            None => 0,
        };
        self.prune(account);
        amount
    }

    fn prune(&mut self, account: &AccountId) {
        if self.records.get(account).is_some_and(|r| r.is_vacant()) {
            self.records.remove(account);
        }
    }

    /// Active stakers in account order.
    pub fn active_stakers(&self) -> impl Iterator<Item = (&AccountId, &StakerRecord)> {
        self.records.iter().filter(|(_, r)| r.is_active())
    }

    /// Units of every active staker, keyed by account.
    pub fn unit_snapshot(&self) -> BTreeMap<AccountId, u64> {
        self.active_stakers()
            .map(|(account, record)| (*account, record.staked_units))
            .collect()
    }

    pub fn get(&self, account: &AccountId) -> Option<&StakerRecord> {
        self.records.get(account)
    }

    /// Total principal across active stakers, in ticks.
    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// Total principal across active stakers, in units.
    pub fn total_units(&self) -> u64 {
        self.total_units
    }

    /// Number of active stakers.
    pub fn staker_count(&self) -> usize {
        self.staker_count
    }

    /// Sum of unclaimed rewards across all records.
    pub fn total_unclaimed(&self) -> Amount {
        self.records.values().map(|r| r.unclaimed_rewards).sum()
    }
}
