// crates/timetick-economics/src/events.rs
//
// Events emitted by the engine. The engine buffers them; hosts drain the
// buffer after each operation and forward them to downstream consumers.
// Serialized field names are camelCase to match the published event schema.

use serde::{Deserialize, Serialize};

use timetick_core::token::Amount;
use timetick_core::{AccountId, TickError};

/// Events emitted during engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EngineEvent {
    /// A batch was split among the funds.
    #[serde(rename_all = "camelCase")]
    FundDistribution {
        dev_amount: Amount,
        stability_amount: Amount,
        timekeepers_amount: Amount,
        /// Active stakers credited from the timekeeper pool.
        valid_timekeepers: u64,
        timestamp: u64,
    },
    /// New supply was minted.
    #[serde(rename_all = "camelCase")]
    TokensMinted { amount: Amount, validated: bool },
    /// A validated batch compared supply against the genesis formula.
    #[serde(rename_all = "camelCase")]
    SupplyValidation {
        total_seconds_since_genesis: u64,
        previous_supply: Amount,
        expected_supply: Amount,
        adjustment_amount: Amount,
        validated: bool,
    },
    /// A batch's timekeeper pool was accrued.
    #[serde(rename_all = "camelCase")]
    RewardsProcessed {
        total_rewards: Amount,
        dev_share: Amount,
        staker_share: Amount,
        /// Minted amount relative to `elapsed * rate`, in basis points.
        correction_factor: u64,
    },
    #[serde(rename_all = "camelCase")]
    Staked {
        account: AccountId,
        units: u64,
        amount: Amount,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    UnstakeRequested {
        account: AccountId,
        units: u64,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    UnstakeCancelled { account: AccountId, timestamp: u64 },
    #[serde(rename_all = "camelCase")]
    Unstaked {
        account: AccountId,
        units: u64,
        amount: Amount,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    StakeRenewed { account: AccountId, timestamp: u64 },
    /// A lapsed stake was force-unstaked by the expiry sweep.
    #[serde(rename_all = "camelCase")]
    StakeExpired {
        account: AccountId,
        units: u64,
        amount: Amount,
        claimable_rewards: Amount,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    RewardsClaimed {
        account: AccountId,
        amount: Amount,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    MinimumStakeUpdated { previous: u64, current: u64 },
}

impl EngineEvent {
    /// Short event name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::FundDistribution { .. } => "FundDistribution",
            EngineEvent::TokensMinted { .. } => "TokensMinted",
            EngineEvent::SupplyValidation { .. } => "SupplyValidation",
            EngineEvent::RewardsProcessed { .. } => "RewardsProcessed",
            EngineEvent::Staked { .. } => "Staked",
            EngineEvent::UnstakeRequested { .. } => "UnstakeRequested",
            EngineEvent::UnstakeCancelled { .. } => "UnstakeCancelled",
            EngineEvent::Unstaked { .. } => "Unstaked",
            EngineEvent::StakeRenewed { .. } => "StakeRenewed",
            EngineEvent::StakeExpired { .. } => "StakeExpired",
            EngineEvent::RewardsClaimed { .. } => "RewardsClaimed",
            EngineEvent::MinimumStakeUpdated { .. } => "MinimumStakeUpdated",
        }
    }

    /// JSON encoding with the camelCase field names.
    pub fn to_json(&self) -> Result<String, TickError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fund_distribution_field_names() {
        let event = EngineEvent::FundDistribution {
            dev_amount: 5_040,
            stability_amount: 2_160,
            timekeepers_amount: 0,
            valid_timekeepers: 0,
            timestamp: 7_200,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], "FundDistribution");
        assert_eq!(json["devAmount"], 5_040);
        assert_eq!(json["stabilityAmount"], 2_160);
        assert_eq!(json["timekeepersAmount"], 0);
        assert_eq!(json["validTimekeepers"], 0);
        assert_eq!(json["timestamp"], 7_200);
    }

    #[test]
    fn test_supply_validation_field_names() {
        let event = EngineEvent::SupplyValidation {
            total_seconds_since_genesis: 10,
            previous_supply: 1,
            expected_supply: 10,
            adjustment_amount: 9,
            validated: true,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["totalSecondsSinceGenesis"], 10);
        assert_eq!(json["previousSupply"], 1);
        assert_eq!(json["adjustmentAmount"], 9);
        assert_eq!(json["validated"], true);
        assert_eq!(event.name(), "SupplyValidation");
    }
}
