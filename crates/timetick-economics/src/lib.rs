// crates/timetick-economics/src/lib.rs
//
// timetick-economics: time-linked emission, fund routing, staking, reward
// accrual, and supply validation for the TTB token.

pub mod distribution;
pub mod emission;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod params;
pub mod rewards;
pub mod staking;
pub mod supply;

pub use distribution::{select_split, split_emission, FundSplit};
pub use emission::{batch_emission, expected_supply, BatchSchedule, DueBatch};
pub use engine::{
    BatchReport, EngineAccounts, NetworkStats, StakerInfo, TimeTickEngine, ValidatedBatch,
};
pub use events::EngineEvent;
pub use ledger::InMemoryLedger;
pub use params::{DistributionSplit, EmissionParams, BPS_DENOMINATOR};
pub use rewards::{eligible_weights, proportional_shares, AccrualOutcome, RewardAccrual};
pub use staking::{whole_units, ExpiredStake, StakeRegistry, StakerRecord};
pub use supply::{validate_supply, SupplyReport};
