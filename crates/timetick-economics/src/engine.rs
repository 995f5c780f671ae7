// crates/timetick-economics/src/engine.rs
//
// TimeTickEngine: the public operation surface.
//
// Every operation runs to completion against `&mut self`; there is no
// internal concurrency. Operations follow the same shape:
//   1. read the clock once
//   2. check preconditions that do not depend on the expiry sweep
//   3. run the expiry sweep (touch-on-access eviction of lapsed stakes)
//   4. update internal bookkeeping and stage ledger ops and events
//   5. hand the staged ops to the ledger in one `apply` call
// If any step fails, including the ledger call, bookkeeping is restored from
// the checkpoint taken before step 3 and nothing is emitted. The sweep is
// part of the operation: a lapsed stake touched by a failing operation stays
// in place until the next operation that commits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use timetick_core::token::{Amount, Ttb};
use timetick_core::{AccountId, BalanceLedger, Clock, LedgerOp, TickError};

use crate::distribution::{select_split, split_emission, FundSplit};
use crate::emission::BatchSchedule;
use crate::events::EngineEvent;
use crate::params::{EmissionParams, BPS_DENOMINATOR};
use crate::rewards::{eligible_weights, AccrualOutcome, RewardAccrual};
use crate::staking::{ExpiredStake, StakeRegistry};
use crate::supply::{validate_supply, SupplyReport};

/// The fixed accounts the engine mints into and holds custody in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAccounts {
    /// May change the minimum stake and toggle minting, staking, and rewards.
    pub owner: AccountId,
    /// Development fund.
    pub treasury: AccountId,
    /// Stability reserve.
    pub reserve: AccountId,
    /// Holds staked principal, unclaimed rewards, and the rounding reserve.
    pub custody: AccountId,
}

impl EngineAccounts {
    fn validate(&self) -> Result<(), TickError> {
        let funds = [self.treasury, self.reserve, self.custody];
        if funds[0] == funds[1] || funds[0] == funds[2] || funds[1] == funds[2] {
            return Err(TickError::InvalidConfig(
                "treasury, reserve, and custody accounts must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read-only projection of a staker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerInfo {
    pub staked_amount: Amount,
    pub staked_units: u64,
    pub last_stake_time: u64,
    /// Zero when no unstake is pending.
    pub unstake_request_time: u64,
    pub pending_unstake_units: u64,
    pub last_renewal_time: u64,
    pub unclaimed_rewards: Amount,
    /// Last second at which the stake is still considered renewed.
    pub renewal_deadline: u64,
    /// True if the next touching operation will force-unstake this record.
    pub expired: bool,
}

/// Read-only projection of aggregate engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_staked: Amount,
    pub total_staked_units: u64,
    pub staker_count: usize,
    pub minimum_stake_units: u64,
    pub genesis_time: u64,
    pub last_batch_time: u64,
    pub current_supply: Amount,
    /// Cumulative rounding remainder kept in custody.
    pub undistributed_rewards: Amount,
    pub total_unclaimed_rewards: Amount,
    /// Cumulative rewards credited to stakers.
    pub total_rewards_accrued: Amount,
    /// Cumulative rewards paid out by claims.
    pub total_rewards_claimed: Amount,
    /// Active stakers recorded when the last batch closed.
    pub timekeepers_at_last_batch: usize,
    pub minting_enabled: bool,
    pub staking_enabled: bool,
    pub rewards_enabled: bool,
}

/// What a committed batch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub timestamp: u64,
    /// Seconds since the previous batch.
    pub elapsed: u64,
    /// Ticks minted.
    pub amount: Amount,
    pub split: FundSplit,
    pub accrual: AccrualOutcome,
    pub validated: bool,
    /// Stakes force-unstaked by the sweep at the top of this batch.
    pub expired_stakes: usize,
}

/// Result of the validated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBatch {
    /// Supply check taken before any correction.
    pub report: SupplyReport,
    /// `None` when there was no shortfall to mint.
    pub batch: Option<BatchReport>,
}

/// Ledger ops and events staged by an operation that has not committed yet.
#[derive(Debug, Default)]
struct Pending {
    ops: Vec<LedgerOp>,
    events: Vec<EngineEvent>,
    expired: Vec<ExpiredStake>,
}

impl Pending {
    fn mint(&mut self, to: AccountId, amount: Amount) {
        if amount > 0 {
            self.ops.push(LedgerOp::Mint { to, amount });
        }
    }

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) {
        if amount > 0 && from != to {
            self.ops.push(LedgerOp::Transfer { from, to, amount });
        }
    }

    /// Ticks already staged to arrive in `account`.
    fn incoming(&self, account: &AccountId) -> Amount {
        self.ops
            .iter()
            .map(|op| match op {
                LedgerOp::Mint { to, amount } | LedgerOp::Transfer { to, amount, .. }
                    if to == account =>
                {
                    *amount
                }
                _ => 0,
            })
            .sum()
    }
}

/// Bookkeeping restored when an operation fails.
struct Checkpoint {
    schedule: BatchSchedule,
    registry: StakeRegistry,
    accrual: RewardAccrual,
    boundary: BTreeMap<AccountId, u64>,
}

/// The emission, staking, and reward engine.
pub struct TimeTickEngine<L: BalanceLedger, C: Clock> {
    params: EmissionParams,
    accounts: EngineAccounts,
    ledger: L,
    clock: C,
    schedule: BatchSchedule,
    registry: StakeRegistry,
    accrual: RewardAccrual,
    /// Units of every active staker when the last batch closed.
    boundary: BTreeMap<AccountId, u64>,
    minting_enabled: bool,
    staking_enabled: bool,
    rewards_enabled: bool,
    events: Vec<EngineEvent>,
}

impl<L: BalanceLedger, C: Clock> TimeTickEngine<L, C> {
    /// Create an engine whose genesis is the clock's current time.
    ///
    /// # Errors
    /// Returns `TickError::InvalidConfig` if the parameters or accounts are
    /// inconsistent.
    pub fn new(
        params: EmissionParams,
        accounts: EngineAccounts,
        ledger: L,
        clock: C,
    ) -> Result<Self, TickError> {
        let genesis = clock.now();
        Self::with_genesis(params, accounts, ledger, clock, genesis)
    }

    /// Create an engine anchored at an explicit genesis time.
    pub fn with_genesis(
        params: EmissionParams,
        accounts: EngineAccounts,
        ledger: L,
        clock: C,
        genesis_time: u64,
    ) -> Result<Self, TickError> {
        params.validate()?;
        accounts.validate()?;
        tracing::info!(
            "TimeTick engine genesis at {} (rate {} ticks/s, batch interval {}s)",
            genesis_time,
            params.emission_rate_per_second,
            params.batch_interval_secs
        );
        Ok(Self {
            schedule: BatchSchedule::new(genesis_time, params.batch_interval_secs),
            registry: StakeRegistry::new(params.stake_unit, params.minimum_stake_units),
            accrual: RewardAccrual::new(),
            boundary: BTreeMap::new(),
            minting_enabled: true,
            staking_enabled: true,
            rewards_enabled: true,
            events: Vec::new(),
            params,
            accounts,
            ledger,
            clock,
        })
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            schedule: self.schedule.clone(),
            registry: self.registry.clone(),
            accrual: self.accrual.clone(),
            boundary: self.boundary.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.schedule = checkpoint.schedule;
        self.registry = checkpoint.registry;
        self.accrual = checkpoint.accrual;
        self.boundary = checkpoint.boundary;
    }

    /// Run `body` as one unit: sweep, bookkeeping, then a single ledger call.
    fn transact<T>(
        &mut self,
        now: u64,
        body: impl FnOnce(&mut Self, &mut Pending) -> Result<T, TickError>,
    ) -> Result<T, TickError> {
        let checkpoint = self.checkpoint();
        let mut pending = Pending::default();
        self.sweep_expired(now, &mut pending);
        let result = body(&mut *self, &mut pending).and_then(|value| {
            if !pending.ops.is_empty() {
                self.ledger.apply(&pending.ops)?;
            }
            Ok(value)
        });

        match result {
            Ok(value) => {
                for stake in &pending.expired {
                    tracing::info!(
                        "Stake of {} expired: returned {}, {} rewards left claimable",
                        stake.account,
                        Ttb::from_ticks(stake.amount),
                        Ttb::from_ticks(stake.unclaimed_rewards)
                    );
                }
                self.events.append(&mut pending.events);
                Ok(value)
            }
            Err(err) => {
                self.restore(checkpoint);
                tracing::debug!("Operation at {} rolled back: {}", now, err);
                Err(err)
            }
        }
    }

    /// Force-unstake every lapsed stake and stage its principal refund.
    fn sweep_expired(&mut self, now: u64, pending: &mut Pending) {
        let expired = self
            .registry
            .sweep_expired(now, self.params.renewal_period_secs);
        for stake in &expired {
            pending.transfer(self.accounts.custody, stake.account, stake.amount);
            pending.events.push(EngineEvent::StakeExpired {
                account: stake.account,
                units: stake.units,
                amount: stake.amount,
                claimable_rewards: stake.unclaimed_rewards,
                timestamp: now,
            });
        }
        pending.expired = expired;
    }

    // ------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------

    /// Mint everything emitted since the last batch and route it.
    ///
    /// # Errors
    /// `BatchNotDue` before the batch interval elapsed; `InvalidState` while
    /// minting is paused.
    pub fn mint_batch(&mut self) -> Result<BatchReport, TickError> {
        let now = self.clock.now();
        self.ensure_minting()?;
        let due = self.schedule.due(now, self.params.emission_rate_per_second)?;
        let report = self.transact(now, |engine, pending| {
            engine.commit_batch(pending, now, due.elapsed, due.amount, due.amount, false)
        })?;
        log_batch(&report);
        Ok(report)
    }

    /// Batch variant that reconciles the ledger's supply against the
    /// genesis formula and mints only the shortfall.
    ///
    /// Over-issuance is reported (`report.valid == false`) but never burned.
    ///
    /// # Errors
    /// Same guards as `mint_batch`.
    pub fn mint_batch_validated(&mut self) -> Result<ValidatedBatch, TickError> {
        let now = self.clock.now();
        self.ensure_minting()?;
        let due = self.schedule.due(now, self.params.emission_rate_per_second)?;
        let report = validate_supply(
            self.schedule.genesis_time(),
            now,
            self.params.emission_rate_per_second,
            self.ledger.total_supply(),
        )?;

        let adjustment = report.shortfall();
        let outcome = self.transact(now, |engine, pending| {
            let batch = if adjustment > 0 {
                Some(engine.commit_batch(pending, now, due.elapsed, adjustment, due.amount, true)?)
            } else {
                None
            };
            pending.events.push(EngineEvent::SupplyValidation {
                total_seconds_since_genesis: report.total_elapsed_seconds,
                previous_supply: report.current_supply,
                expected_supply: report.expected_supply,
                adjustment_amount: adjustment,
                validated: report.valid,
            });
            Ok(ValidatedBatch { report, batch })
        })?;

        match &outcome.batch {
            Some(batch) => log_batch(batch),
            None if !outcome.report.valid => tracing::warn!(
                "Supply exceeds formula by {} ({} issued, {} expected); not minting",
                Ttb::from_ticks(outcome.report.excess()),
                Ttb::from_ticks(outcome.report.current_supply),
                Ttb::from_ticks(outcome.report.expected_supply)
            ),
            None => tracing::debug!("Supply matches formula at {}; nothing to mint", now),
        }
        Ok(outcome)
    }

    /// Read-only supply check at the current time.
    pub fn validate_supply(&self) -> Result<SupplyReport, TickError> {
        validate_supply(
            self.schedule.genesis_time(),
            self.clock.now(),
            self.params.emission_rate_per_second,
            self.ledger.total_supply(),
        )
    }

    fn ensure_minting(&self) -> Result<(), TickError> {
        if !self.minting_enabled {
            return Err(TickError::InvalidState("Minting is paused".to_string()));
        }
        Ok(())
    }

    /// Split `amount`, accrue the timekeeper pool to the stakers recorded at
    /// the previous boundary, advance the cursor, and stage the mints.
    ///
    /// `nominal` is `elapsed * rate` for the interval, used for the
    /// correction factor.
    fn commit_batch(
        &mut self,
        pending: &mut Pending,
        now: u64,
        elapsed: u64,
        amount: Amount,
        nominal: Amount,
        validated: bool,
    ) -> Result<BatchReport, TickError> {
        let weights = if self.rewards_enabled {
            eligible_weights(&self.registry, &self.boundary)
        } else {
            Vec::new()
        };
        let split_params = select_split(
            &self.params.staker_split,
            &self.params.no_staker_split,
            weights.len(),
        );
        let split = split_emission(amount, split_params)?;
        let accrual = self
            .accrual
            .accrue(split.timekeepers, &mut self.registry, &weights)?;

        self.schedule.advance(now);
        self.boundary = self.registry.unit_snapshot();

        pending.mint(self.accounts.treasury, split.treasury);
        pending.mint(self.accounts.reserve, split.reserve);
        pending.mint(self.accounts.custody, split.timekeepers);

        pending.events.push(EngineEvent::TokensMinted { amount, validated });
        pending.events.push(EngineEvent::FundDistribution {
            dev_amount: split.treasury,
            stability_amount: split.reserve,
            timekeepers_amount: split.timekeepers,
            valid_timekeepers: accrual.recipients as u64,
            timestamp: now,
        });
        if split.timekeepers > 0 {
            pending.events.push(EngineEvent::RewardsProcessed {
                total_rewards: amount,
                dev_share: split.treasury,
                staker_share: accrual.distributed,
                correction_factor: correction_factor(amount, nominal),
            });
        }

        Ok(BatchReport {
            timestamp: now,
            elapsed,
            amount,
            split,
            accrual,
            validated,
            expired_stakes: pending.expired.len(),
        })
    }

    // ------------------------------------------------------------------
    // Staking
    // ------------------------------------------------------------------

    /// Lock `amount` ticks of the caller's balance as stake.
    ///
    /// # Errors
    /// `NonWholeUnit`, `BelowMinimumStake`, `InsufficientBalance`, or
    /// `InvalidState` while staking is paused.
    pub fn stake(&mut self, caller: &AccountId, amount: Amount) -> Result<u64, TickError> {
        let now = self.clock.now();
        if !self.staking_enabled {
            return Err(TickError::InvalidState("Staking is paused".to_string()));
        }
        if *caller == self.accounts.custody {
            return Err(TickError::InvalidState(
                "Custody account cannot stake".to_string(),
            ));
        }
        let units = self.registry.check_stake(amount)?;

        self.transact(now, |engine, pending| {
            // A refund staged by the sweep counts towards the new stake.
            let available = engine
                .ledger
                .balance_of(caller)
                .saturating_add(pending.incoming(caller));
            if available < amount {
                return Err(TickError::InsufficientBalance {
                    requested: amount,
                    available,
                });
            }
            engine.registry.stake(*caller, units, now)?;
            pending.transfer(*caller, engine.accounts.custody, amount);
            pending.events.push(EngineEvent::Staked {
                account: *caller,
                units,
                amount,
                timestamp: now,
            });
            Ok(())
        })?;

        tracing::info!("{} staked {} units ({})", caller, units, Ttb::from_ticks(amount));
        Ok(units)
    }

    /// Start the unstake delay for `amount` ticks of the caller's stake.
    pub fn request_unstake(
        &mut self,
        caller: &AccountId,
        amount: Amount,
    ) -> Result<u64, TickError> {
        let now = self.clock.now();
        let units = self.transact(now, |engine, pending| {
            let units = engine.registry.request_unstake(caller, amount, now)?;
            pending.events.push(EngineEvent::UnstakeRequested {
                account: *caller,
                units,
                timestamp: now,
            });
            Ok(units)
        })?;
        tracing::info!("{} requested unstake of {} units", caller, units);
        Ok(units)
    }

    /// Clear the caller's pending unstake request.
    pub fn cancel_unstake(&mut self, caller: &AccountId) -> Result<(), TickError> {
        let now = self.clock.now();
        self.transact(now, |engine, pending| {
            engine.registry.cancel_unstake(caller)?;
            pending.events.push(EngineEvent::UnstakeCancelled {
                account: *caller,
                timestamp: now,
            });
            Ok(())
        })?;
        tracing::info!("{} cancelled unstake request", caller);
        Ok(())
    }

    /// Return the requested principal once the unstake delay has elapsed.
    ///
    /// # Errors
    /// `UnstakeNotReady` without a pending request or before the delay.
    pub fn unstake(&mut self, caller: &AccountId) -> Result<Amount, TickError> {
        let now = self.clock.now();
        let delay = self.params.unstake_delay_secs;
        let (units, amount) = self.transact(now, |engine, pending| {
            let (units, amount) = engine.registry.unstake(caller, now, delay)?;
            pending.transfer(engine.accounts.custody, *caller, amount);
            pending.events.push(EngineEvent::Unstaked {
                account: *caller,
                units,
                amount,
                timestamp: now,
            });
            Ok((units, amount))
        })?;
        tracing::info!("{} unstaked {} units ({})", caller, units, Ttb::from_ticks(amount));
        Ok(amount)
    }

    /// Reset the caller's renewal timer.
    ///
    /// A stake that already lapsed is swept first, so renewing it fails with
    /// `NotFound`.
    pub fn renew_stake(&mut self, caller: &AccountId) -> Result<(), TickError> {
        let now = self.clock.now();
        self.transact(now, |engine, pending| {
            engine.registry.renew(caller, now)?;
            pending.events.push(EngineEvent::StakeRenewed {
                account: *caller,
                timestamp: now,
            });
            Ok(())
        })?;
        tracing::debug!("{} renewed stake", caller);
        Ok(())
    }

    /// Pay out the caller's unclaimed rewards. Returns the amount paid.
    ///
    /// Rewards accrued before a rewards pause stay claimable.
    pub fn claim_rewards(&mut self, caller: &AccountId) -> Result<Amount, TickError> {
        let now = self.clock.now();
        let amount = self.transact(now, |engine, pending| {
            let amount = engine.registry.take_rewards(caller);
            if amount > 0 {
                engine.accrual.record_claim(amount);
                pending.transfer(engine.accounts.custody, *caller, amount);
                pending.events.push(EngineEvent::RewardsClaimed {
                    account: *caller,
                    amount,
                    timestamp: now,
                });
            }
            Ok(amount)
        })?;
        if amount == 0 {
            tracing::debug!("{} has no rewards to claim", caller);
        } else {
            tracing::info!("{} claimed {}", caller, Ttb::from_ticks(amount));
        }
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Owner operations
    // ------------------------------------------------------------------

    fn ensure_owner(&self, caller: &AccountId, action: &str) -> Result<(), TickError> {
        if *caller != self.accounts.owner {
            return Err(TickError::Unauthorized(format!(
                "{} may not {}",
                caller, action
            )));
        }
        Ok(())
    }

    /// Change the minimum units for future stakes.
    pub fn set_minimum_stake_units(
        &mut self,
        caller: &AccountId,
        units: u64,
    ) -> Result<(), TickError> {
        self.ensure_owner(caller, "set the minimum stake")?;
        let previous = self.registry.minimum_stake_units();
        self.registry.set_minimum_stake_units(units)?;
        tracing::info!("Minimum stake changed from {} to {} units", previous, units);
        self.events.push(EngineEvent::MinimumStakeUpdated {
            previous,
            current: units,
        });
        Ok(())
    }

    /// Pause or resume batches. Returns the new state.
    pub fn toggle_minting(&mut self, caller: &AccountId) -> Result<bool, TickError> {
        self.ensure_owner(caller, "toggle minting")?;
        self.minting_enabled = !self.minting_enabled;
        tracing::info!("Minting enabled: {}", self.minting_enabled);
        Ok(self.minting_enabled)
    }

    /// Pause or resume new stakes. Returns the new state.
    pub fn toggle_staking(&mut self, caller: &AccountId) -> Result<bool, TickError> {
        self.ensure_owner(caller, "toggle staking")?;
        self.staking_enabled = !self.staking_enabled;
        tracing::info!("Staking enabled: {}", self.staking_enabled);
        Ok(self.staking_enabled)
    }

    /// Pause or resume the timekeeper pool. Returns the new state.
    ///
    /// While paused, batches route with the no-staker split.
    pub fn toggle_rewards(&mut self, caller: &AccountId) -> Result<bool, TickError> {
        self.ensure_owner(caller, "toggle rewards")?;
        self.rewards_enabled = !self.rewards_enabled;
        tracing::info!("Rewards enabled: {}", self.rewards_enabled);
        Ok(self.rewards_enabled)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn staker_info(&self, account: &AccountId) -> Option<StakerInfo> {
        let record = self.registry.get(account)?;
        let renewal_deadline = record
            .last_renewal_time
            .saturating_add(self.params.renewal_period_secs);
        Some(StakerInfo {
            staked_amount: record.staked_amount,
            staked_units: record.staked_units,
            last_stake_time: record.last_stake_time,
            unstake_request_time: record.unstake_requested_at.unwrap_or(0),
            pending_unstake_units: record.pending_unstake_units,
            last_renewal_time: record.last_renewal_time,
            unclaimed_rewards: record.unclaimed_rewards,
            renewal_deadline,
            expired: record.is_active() && self.clock.now() > renewal_deadline,
        })
    }

    pub fn network_stats(&self) -> NetworkStats {
        NetworkStats {
            total_staked: self.registry.total_staked(),
            total_staked_units: self.registry.total_units(),
            staker_count: self.registry.staker_count(),
            minimum_stake_units: self.registry.minimum_stake_units(),
            genesis_time: self.schedule.genesis_time(),
            last_batch_time: self.schedule.last_batch_time(),
            current_supply: self.ledger.total_supply(),
            undistributed_rewards: self.accrual.undistributed(),
            total_unclaimed_rewards: self.registry.total_unclaimed(),
            total_rewards_accrued: self.accrual.total_accrued(),
            total_rewards_claimed: self.accrual.total_claimed(),
            timekeepers_at_last_batch: self.boundary.len(),
            minting_enabled: self.minting_enabled,
            staking_enabled: self.staking_enabled,
            rewards_enabled: self.rewards_enabled,
        }
    }

    /// Seconds until the next batch is allowed (zero if due now).
    pub fn seconds_until_due(&self) -> u64 {
        self.schedule
            .batch_interval()
            .saturating_sub(self.schedule.elapsed(self.clock.now()))
    }

    /// Take every buffered event, oldest first.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn params(&self) -> &EmissionParams {
        &self.params
    }

    pub fn accounts(&self) -> &EngineAccounts {
        &self.accounts
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Direct ledger access for the host (plain transfers between users).
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn log_batch(report: &BatchReport) {
    tracing::info!(
        "Batch at {}: minted {} over {}s (treasury {}, reserve {}, timekeepers {} to {} stakers)",
        report.timestamp,
        Ttb::from_ticks(report.amount),
        report.elapsed,
        Ttb::from_ticks(report.split.treasury),
        Ttb::from_ticks(report.split.reserve),
        Ttb::from_ticks(report.split.timekeepers),
        report.accrual.recipients
    );
}

/// `amount / nominal` in basis points; 10,000 when nothing was nominally due.
fn correction_factor(amount: Amount, nominal: Amount) -> u64 {
    if nominal == 0 {
        return BPS_DENOMINATOR as u64;
    }
    amount
        .checked_mul(BPS_DENOMINATOR as u128)
        .map(|v| v / nominal)
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use timetick_core::token::TICKS_PER_TTB;
    use timetick_core::ManualClock;

    const T0: u64 = 1_700_000_000;
    const HOUR: u64 = 3_600;

    fn accounts() -> EngineAccounts {
        EngineAccounts {
            owner: AccountId::repeat(0xaa),
            treasury: AccountId::repeat(0xd0),
            reserve: AccountId::repeat(0x50),
            custody: AccountId::repeat(0xcc),
        }
    }

    fn user(b: u8) -> AccountId {
        AccountId::repeat(b)
    }

    type TestEngine = TimeTickEngine<InMemoryLedger, ManualClock>;

    fn engine() -> (TestEngine, ManualClock) {
        let clock = ManualClock::new(T0);
        let engine = TimeTickEngine::new(
            EmissionParams::default(),
            accounts(),
            InMemoryLedger::new(),
            clock.clone(),
        )
        .unwrap();
        (engine, clock)
    }

    fn unit() -> Amount {
        EmissionParams::default().stake_unit
    }

    /// Give `to` funds out of the treasury.
    fn fund(engine: &mut TestEngine, to: &AccountId, amount: Amount) {
        let treasury = engine.accounts().treasury;
        engine.ledger_mut().transfer(&treasury, to, amount).unwrap();
    }

    /// Ledger that rejects every non-empty op list while frozen.
    #[derive(Default)]
    struct FlakyLedger {
        inner: InMemoryLedger,
        frozen: bool,
    }

    impl BalanceLedger for FlakyLedger {
        fn balance_of(&self, account: &AccountId) -> Amount {
            self.inner.balance_of(account)
        }

        fn total_supply(&self) -> Amount {
            self.inner.total_supply()
        }

        fn apply(&mut self, ops: &[LedgerOp]) -> Result<(), TickError> {
            if self.frozen {
                return Err(TickError::Ledger("ledger frozen".to_string()));
            }
            self.inner.apply(ops)
        }
    }

    type FlakyEngine = TimeTickEngine<FlakyLedger, ManualClock>;

    /// Engine on a flaky ledger with `alice` staked one unit after a
    /// four-hour first batch.
    fn flaky_engine_with_staker(alice: &AccountId) -> (FlakyEngine, ManualClock) {
        let clock = ManualClock::new(T0);
        let mut engine = TimeTickEngine::new(
            EmissionParams::default(),
            accounts(),
            FlakyLedger::default(),
            clock.clone(),
        )
        .unwrap();
        clock.advance(4 * HOUR);
        engine.mint_batch().unwrap();
        let treasury = accounts().treasury;
        engine
            .ledger_mut()
            .inner
            .transfer(&treasury, alice, unit())
            .unwrap();
        engine.stake(alice, unit()).unwrap();
        engine.drain_events();
        (engine, clock)
    }

    #[test]
    fn test_rejects_shared_fund_accounts() {
        let mut acc = accounts();
        acc.reserve = acc.treasury;
        let result = TimeTickEngine::new(
            EmissionParams::default(),
            acc,
            InMemoryLedger::new(),
            ManualClock::new(T0),
        );
        assert!(matches!(result, Err(TickError::InvalidConfig(_))));
    }

    #[test]
    fn test_batch_not_due() {
        let (mut engine, clock) = engine();
        clock.advance(HOUR - 1);
        assert_eq!(
            engine.mint_batch().unwrap_err(),
            TickError::BatchNotDue {
                elapsed: HOUR - 1,
                interval: HOUR
            }
        );
        assert_eq!(engine.network_stats().last_batch_time, T0);
        assert_eq!(engine.ledger().total_supply(), 0);
        assert_eq!(engine.seconds_until_due(), 1);
    }

    #[test]
    fn test_first_batch_no_stakers() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        let report = engine.mint_batch().unwrap();

        assert_eq!(report.amount, 7_200 * TICKS_PER_TTB);
        assert_eq!(engine.ledger().balance_of(&accounts().treasury), 5_040 * TICKS_PER_TTB);
        assert_eq!(engine.ledger().balance_of(&accounts().reserve), 2_160 * TICKS_PER_TTB);
        assert_eq!(engine.network_stats().last_batch_time, T0 + 2 * HOUR);

        let events = engine.drain_events();
        assert_eq!(
            events,
            vec![
                EngineEvent::TokensMinted {
                    amount: 7_200 * TICKS_PER_TTB,
                    validated: false
                },
                EngineEvent::FundDistribution {
                    dev_amount: 5_040 * TICKS_PER_TTB,
                    stability_amount: 2_160 * TICKS_PER_TTB,
                    timekeepers_amount: 0,
                    valid_timekeepers: 0,
                    timestamp: T0 + 2 * HOUR,
                },
            ]
        );
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_stake_validation_errors() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);

        assert!(matches!(
            engine.stake(&alice, unit() - TICKS_PER_TTB),
            Err(TickError::NonWholeUnit { .. })
        ));
        assert!(matches!(
            engine.stake(&alice, 0),
            Err(TickError::BelowMinimumStake { .. })
        ));
        assert_eq!(
            engine.stake(&alice, unit()).unwrap_err(),
            TickError::InsufficientBalance {
                requested: unit(),
                available: 0
            }
        );
        assert!(engine.staker_info(&alice).is_none());
        assert_eq!(engine.network_stats().total_staked, 0);
    }

    #[test]
    fn test_stake_moves_principal_to_custody() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit() + 10);

        assert_eq!(engine.stake(&alice, unit()).unwrap(), 1);
        assert_eq!(engine.ledger().balance_of(&alice), 10);
        assert_eq!(engine.ledger().balance_of(&accounts().custody), unit());

        let info = engine.staker_info(&alice).unwrap();
        assert_eq!(info.staked_amount, unit());
        assert_eq!(info.staked_units, 1);
        assert_eq!(info.last_stake_time, T0 + 2 * HOUR);
        assert_eq!(info.unstake_request_time, 0);
        assert!(!info.expired);

        let stats = engine.network_stats();
        assert_eq!(stats.total_staked, unit());
        assert_eq!(stats.staker_count, 1);
    }

    #[test]
    fn test_only_owner_sets_minimum() {
        let (mut engine, _clock) = engine();
        assert!(matches!(
            engine.set_minimum_stake_units(&user(1), 5),
            Err(TickError::Unauthorized(_))
        ));
        engine.set_minimum_stake_units(&accounts().owner, 5).unwrap();
        assert_eq!(engine.network_stats().minimum_stake_units, 5);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::MinimumStakeUpdated {
                previous: 1,
                current: 5
            }]
        );
    }

    #[test]
    fn test_minimum_applies_to_new_stakes_only() {
        let (mut engine, clock) = engine();
        clock.advance(4 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, 2 * unit());
        engine.stake(&alice, unit()).unwrap();

        engine.set_minimum_stake_units(&accounts().owner, 2).unwrap();
        assert_eq!(engine.staker_info(&alice).unwrap().staked_units, 1);
        assert!(matches!(
            engine.stake(&alice, unit()),
            Err(TickError::BelowMinimumStake { units: 1, minimum: 2 })
        ));
    }

    #[test]
    fn test_toggles_are_owner_only() {
        let (mut engine, clock) = engine();
        assert!(engine.toggle_minting(&user(1)).is_err());
        assert!(!engine.toggle_minting(&accounts().owner).unwrap());

        clock.advance(2 * HOUR);
        assert!(matches!(engine.mint_batch(), Err(TickError::InvalidState(_))));
        assert!(engine.toggle_minting(&accounts().owner).unwrap());
        assert!(engine.mint_batch().is_ok());

        assert!(!engine.toggle_staking(&accounts().owner).unwrap());
        fund(&mut engine, &user(1), unit());
        assert!(matches!(
            engine.stake(&user(1), unit()),
            Err(TickError::InvalidState(_))
        ));
    }

    #[test]
    fn test_unstake_flow() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();

        assert!(matches!(engine.unstake(&alice), Err(TickError::UnstakeNotReady(_))));
        engine.request_unstake(&alice, unit()).unwrap();
        let requested_at = clock.now();
        assert_eq!(engine.staker_info(&alice).unwrap().unstake_request_time, requested_at);

        clock.advance(EmissionParams::default().unstake_delay_secs - 1);
        assert!(matches!(engine.unstake(&alice), Err(TickError::UnstakeNotReady(_))));

        clock.advance(1);
        assert_eq!(engine.unstake(&alice).unwrap(), unit());
        assert_eq!(engine.ledger().balance_of(&alice), unit());
        assert_eq!(engine.network_stats().total_staked, 0);
        assert_eq!(engine.network_stats().staker_count, 0);
    }

    #[test]
    fn test_cancel_unstake_clears_timer() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();
        engine.request_unstake(&alice, unit()).unwrap();
        engine.cancel_unstake(&alice).unwrap();

        let info = engine.staker_info(&alice).unwrap();
        assert_eq!(info.unstake_request_time, 0);
        assert_eq!(info.staked_amount, unit());

        clock.advance(EmissionParams::default().unstake_delay_secs);
        assert!(matches!(engine.unstake(&alice), Err(TickError::UnstakeNotReady(_))));
    }

    #[test]
    fn test_new_staker_waits_one_batch_for_split() {
        let (mut engine, clock) = engine();
        let acc = accounts();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();
        engine.drain_events();

        // Staker joined mid-interval: this batch still uses the no-staker split.
        clock.advance(HOUR);
        let report = engine.mint_batch().unwrap();
        assert_eq!(report.split.timekeepers, 0);
        assert_eq!(report.split.treasury, 2_520 * TICKS_PER_TTB);
        assert_eq!(report.split.reserve, 1_080 * TICKS_PER_TTB);
        assert_eq!(engine.staker_info(&alice).unwrap().unclaimed_rewards, 0);
        assert_eq!(engine.network_stats().timekeepers_at_last_batch, 1);

        clock.advance(HOUR);
        let report = engine.mint_batch().unwrap();
        assert_eq!(report.split.treasury, 720 * TICKS_PER_TTB);
        assert_eq!(report.split.reserve, 360 * TICKS_PER_TTB);
        assert_eq!(report.split.timekeepers, 2_520 * TICKS_PER_TTB);
        assert_eq!(report.accrual.recipients, 1);
        assert_eq!(
            engine.staker_info(&alice).unwrap().unclaimed_rewards,
            2_520 * TICKS_PER_TTB
        );

        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::RewardsProcessed {
            total_rewards: 3_600 * TICKS_PER_TTB,
            dev_share: 720 * TICKS_PER_TTB,
            staker_share: 2_520 * TICKS_PER_TTB,
            correction_factor: 10_000,
        }));

        let stats = engine.network_stats();
        assert_eq!(
            engine.ledger().balance_of(&acc.custody),
            stats.total_staked + stats.total_unclaimed_rewards + stats.undistributed_rewards
        );

        assert_eq!(engine.claim_rewards(&alice).unwrap(), 2_520 * TICKS_PER_TTB);
        assert_eq!(engine.ledger().balance_of(&alice), 2_520 * TICKS_PER_TTB);
        assert_eq!(engine.ledger().balance_of(&acc.custody), unit());
        assert_eq!(engine.claim_rewards(&alice).unwrap(), 0);
    }

    #[test]
    fn test_lapsed_stake_swept_on_next_touch() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();
        engine.drain_events();

        let period = EmissionParams::default().renewal_period_secs;
        clock.advance(period);
        assert!(!engine.staker_info(&alice).unwrap().expired);
        clock.advance(1);
        assert!(engine.staker_info(&alice).unwrap().expired);

        // Renewing a lapsed stake fails, and the failed call evicts nothing.
        assert!(matches!(engine.renew_stake(&alice), Err(TickError::NotFound(_))));
        assert_eq!(engine.staker_info(&alice).unwrap().staked_units, 1);
        assert!(engine.drain_events().is_empty());

        let report = engine.mint_batch().unwrap();
        assert_eq!(report.expired_stakes, 1);
        assert!(engine.staker_info(&alice).is_none());
        assert_eq!(engine.ledger().balance_of(&alice), unit());
        assert_eq!(engine.network_stats().staker_count, 0);
        assert_eq!(
            engine.drain_events()[0],
            EngineEvent::StakeExpired {
                account: alice,
                units: 1,
                amount: unit(),
                claimable_rewards: 0,
                timestamp: clock.now(),
            }
        );
    }

    #[test]
    fn test_restake_uses_refund_from_sweep() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();

        clock.advance(EmissionParams::default().renewal_period_secs + 1);
        assert_eq!(engine.stake(&alice, unit()).unwrap(), 1);
        let info = engine.staker_info(&alice).unwrap();
        assert_eq!(info.staked_units, 1);
        assert_eq!(info.last_stake_time, clock.now());
        assert_eq!(engine.ledger().balance_of(&alice), 0);
        assert_eq!(engine.ledger().balance_of(&accounts().custody), unit());
    }

    #[test]
    fn test_failed_stake_leaves_no_record() {
        let alice = user(1);
        let bob = user(2);
        let (mut engine, _clock) = flaky_engine_with_staker(&alice);
        let treasury = accounts().treasury;
        engine
            .ledger_mut()
            .inner
            .transfer(&treasury, &bob, unit())
            .unwrap();

        engine.ledger_mut().frozen = true;
        assert!(matches!(engine.stake(&bob, unit()), Err(TickError::Ledger(_))));
        assert!(engine.staker_info(&bob).is_none());
        assert_eq!(engine.ledger().balance_of(&bob), unit());

        let stats = engine.network_stats();
        assert_eq!(stats.total_staked, unit());
        assert_eq!(stats.staker_count, 1);
        assert!(engine.drain_events().is_empty());

        engine.ledger_mut().frozen = false;
        assert_eq!(engine.stake(&bob, unit()).unwrap(), 1);
        assert_eq!(engine.network_stats().total_staked, 2 * unit());
    }

    #[test]
    fn test_failed_claim_keeps_rewards() {
        let alice = user(1);
        let (mut engine, clock) = flaky_engine_with_staker(&alice);
        clock.advance(HOUR);
        engine.mint_batch().unwrap();
        clock.advance(HOUR);
        engine.mint_batch().unwrap();
        engine.drain_events();
        let earned = 2_520 * TICKS_PER_TTB;
        assert_eq!(engine.staker_info(&alice).unwrap().unclaimed_rewards, earned);

        engine.ledger_mut().frozen = true;
        assert!(matches!(engine.claim_rewards(&alice), Err(TickError::Ledger(_))));
        assert_eq!(engine.staker_info(&alice).unwrap().unclaimed_rewards, earned);
        assert_eq!(engine.network_stats().total_rewards_claimed, 0);
        assert!(engine.drain_events().is_empty());

        engine.ledger_mut().frozen = false;
        assert_eq!(engine.claim_rewards(&alice).unwrap(), earned);
        assert_eq!(engine.ledger().balance_of(&alice), earned);
        assert_eq!(engine.network_stats().total_rewards_claimed, earned);
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let alice = user(1);
        let (mut engine, clock) = flaky_engine_with_staker(&alice);
        clock.advance(HOUR);
        engine.mint_batch().unwrap();
        engine.drain_events();
        let before = engine.network_stats();

        clock.advance(HOUR);
        engine.ledger_mut().frozen = true;
        assert!(matches!(engine.mint_batch(), Err(TickError::Ledger(_))));
        assert!(matches!(
            engine.mint_batch_validated(),
            Err(TickError::Ledger(_))
        ));
        assert_eq!(engine.network_stats(), before);
        assert_eq!(engine.staker_info(&alice).unwrap().unclaimed_rewards, 0);
        assert!(engine.drain_events().is_empty());

        // The interval is still owed in full once the ledger recovers.
        engine.ledger_mut().frozen = false;
        let report = engine.mint_batch().unwrap();
        assert_eq!(report.elapsed, HOUR);
        assert_eq!(report.split.timekeepers, 2_520 * TICKS_PER_TTB);
        assert_eq!(engine.validate_supply().unwrap().diff, 0);
    }

    #[test]
    fn test_failed_sweep_keeps_lapsed_stake() {
        let alice = user(1);
        let (mut engine, clock) = flaky_engine_with_staker(&alice);
        clock.advance(EmissionParams::default().renewal_period_secs + 1);

        engine.ledger_mut().frozen = true;
        assert!(matches!(engine.mint_batch(), Err(TickError::Ledger(_))));
        assert!(engine.staker_info(&alice).unwrap().expired);
        assert_eq!(engine.network_stats().total_staked, unit());
        assert_eq!(engine.ledger().balance_of(&alice), 0);

        engine.ledger_mut().frozen = false;
        assert_eq!(engine.mint_batch().unwrap().expired_stakes, 1);
        assert!(engine.staker_info(&alice).is_none());
        assert_eq!(engine.ledger().balance_of(&alice), unit());
    }

    #[test]
    fn test_mid_interval_joiner_takes_no_pool() {
        let (mut engine, clock) = engine();
        clock.advance(4 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        let bob = user(2);
        fund(&mut engine, &alice, unit());
        fund(&mut engine, &bob, unit());
        engine.stake(&alice, unit()).unwrap();
        engine.request_unstake(&alice, unit()).unwrap();

        // Alice is staked when this batch closes.
        clock.advance(EmissionParams::default().unstake_delay_secs);
        engine.mint_batch().unwrap();
        assert_eq!(engine.network_stats().timekeepers_at_last_batch, 1);

        // She leaves mid-interval, Bob arrives one second before the batch.
        clock.advance(HOUR / 2);
        engine.unstake(&alice).unwrap();
        clock.advance(HOUR / 2 - 1);
        engine.stake(&bob, unit()).unwrap();
        clock.advance(1);

        let report = engine.mint_batch().unwrap();
        assert_eq!(report.split.timekeepers, 0);
        assert_eq!(report.split.treasury, 2_520 * TICKS_PER_TTB);
        assert_eq!(report.accrual.recipients, 0);
        assert_eq!(engine.staker_info(&bob).unwrap().unclaimed_rewards, 0);

        // Bob was staked at this boundary, so the next batch pays him.
        clock.advance(HOUR);
        let report = engine.mint_batch().unwrap();
        assert_eq!(report.split.timekeepers, 2_520 * TICKS_PER_TTB);
        assert_eq!(
            engine.staker_info(&bob).unwrap().unclaimed_rewards,
            2_520 * TICKS_PER_TTB
        );
    }

    #[test]
    fn test_paused_rewards_route_without_timekeepers() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();
        clock.advance(HOUR);
        engine.mint_batch().unwrap();
        clock.advance(HOUR);
        engine.mint_batch().unwrap();
        let earned = 2_520 * TICKS_PER_TTB;

        assert!(matches!(
            engine.toggle_rewards(&alice),
            Err(TickError::Unauthorized(_))
        ));
        assert!(!engine.toggle_rewards(&accounts().owner).unwrap());
        assert!(!engine.network_stats().rewards_enabled);

        clock.advance(HOUR);
        let report = engine.mint_batch().unwrap();
        assert_eq!(report.split.timekeepers, 0);
        assert_eq!(report.split.treasury, 2_520 * TICKS_PER_TTB);
        assert_eq!(report.split.reserve, 1_080 * TICKS_PER_TTB);
        assert_eq!(engine.staker_info(&alice).unwrap().unclaimed_rewards, earned);

        // Already accrued rewards stay claimable while paused.
        assert_eq!(engine.claim_rewards(&alice).unwrap(), earned);
        let stats = engine.network_stats();
        assert_eq!(stats.total_rewards_accrued, earned);
        assert_eq!(stats.total_rewards_claimed, earned);

        assert!(engine.toggle_rewards(&accounts().owner).unwrap());
        clock.advance(HOUR);
        assert_eq!(engine.mint_batch().unwrap().split.timekeepers, earned);
    }

    #[test]
    fn test_renewal_keeps_stake_alive() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        engine.mint_batch().unwrap();
        let alice = user(1);
        fund(&mut engine, &alice, unit());
        engine.stake(&alice, unit()).unwrap();

        let period = EmissionParams::default().renewal_period_secs;
        clock.advance(period);
        engine.renew_stake(&alice).unwrap();
        clock.advance(period);
        engine.mint_batch().unwrap();
        assert_eq!(engine.staker_info(&alice).unwrap().staked_units, 1);
    }

    #[test]
    fn test_validated_batch_mints_shortfall() {
        let (mut engine, clock) = engine();
        clock.advance(2 * HOUR);
        let outcome = engine.mint_batch_validated().unwrap();
        assert!(outcome.report.valid);
        assert_eq!(outcome.report.shortfall(), 7_200 * TICKS_PER_TTB);
        let batch = outcome.batch.unwrap();
        assert!(batch.validated);
        assert_eq!(engine.ledger().total_supply(), 7_200 * TICKS_PER_TTB);

        // Already reconciled: the next validated call in the same second is not due.
        assert!(matches!(
            engine.mint_batch_validated(),
            Err(TickError::BatchNotDue { .. })
        ));
    }

    #[test]
    fn test_validated_batch_reports_over_issuance() {
        let (mut engine, clock) = engine();
        clock.advance(HOUR);
        let outsider = user(9);
        engine
            .ledger_mut()
            .mint(&outsider, 10_000 * TICKS_PER_TTB)
            .unwrap();

        let outcome = engine.mint_batch_validated().unwrap();
        assert!(!outcome.report.valid);
        assert!(outcome.batch.is_none());
        assert_eq!(engine.ledger().total_supply(), 10_000 * TICKS_PER_TTB);
        assert_eq!(engine.network_stats().last_batch_time, T0);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::SupplyValidation {
                total_seconds_since_genesis: HOUR,
                previous_supply: 10_000 * TICKS_PER_TTB,
                expected_supply: 3_600 * TICKS_PER_TTB,
                adjustment_amount: 0,
                validated: false,
            }]
        );
    }

    #[test]
    fn test_claim_without_rewards_is_noop() {
        let (mut engine, _clock) = engine();
        assert_eq!(engine.claim_rewards(&user(1)).unwrap(), 0);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_correction_factor() {
        assert_eq!(correction_factor(100, 100), 10_000);
        assert_eq!(correction_factor(150, 100), 15_000);
        assert_eq!(correction_factor(5, 0), 10_000);
    }
}
