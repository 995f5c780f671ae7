// crates/timetick-daemon/src/config.rs
//
// Runtime configuration for the TimeTick keeper daemon.
// Loaded from a TOML file or populated with defaults.

use serde::Deserialize;
use std::fs;

use timetick_core::token::TICKS_PER_TTB;
use timetick_core::{AccountId, TickError};
use timetick_economics::{DistributionSplit, EmissionParams, EngineAccounts};

/// Runtime configuration for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between checks for a due batch.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Run the validated batch every N batches. 0 disables validation.
    #[serde(default = "default_validate_every")]
    pub validate_every: u64,

    /// Hex account ids.
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_treasury")]
    pub treasury: String,
    #[serde(default = "default_reserve")]
    pub reserve: String,
    #[serde(default = "default_custody")]
    pub custody: String,

    /// Unix seconds. When unset, genesis is the daemon's start time.
    #[serde(default)]
    pub genesis_time: Option<u64>,

    #[serde(default)]
    pub economics: EconomicsConfig,
}

/// The `[economics]` table. Large amounts are given in whole TTB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    pub emission_rate_ttb_per_second: u64,
    pub batch_interval_secs: u64,
    pub stake_unit_ttb: u64,
    pub minimum_stake_units: u64,
    pub unstake_delay_secs: u64,
    pub renewal_period_secs: u64,
    pub staker_split: DistributionSplit,
    pub no_staker_split: DistributionSplit,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        let params = EmissionParams::default();
        Self {
            emission_rate_ttb_per_second: (params.emission_rate_per_second / TICKS_PER_TTB) as u64,
            batch_interval_secs: params.batch_interval_secs,
            stake_unit_ttb: (params.stake_unit / TICKS_PER_TTB) as u64,
            minimum_stake_units: params.minimum_stake_units,
            unstake_delay_secs: params.unstake_delay_secs,
            renewal_period_secs: params.renewal_period_secs,
            staker_split: params.staker_split,
            no_staker_split: params.no_staker_split,
        }
    }
}

impl EconomicsConfig {
    /// Convert to engine parameters and validate them.
    pub fn to_params(&self) -> Result<EmissionParams, TickError> {
        let params = EmissionParams {
            emission_rate_per_second: self.emission_rate_ttb_per_second as u128 * TICKS_PER_TTB,
            batch_interval_secs: self.batch_interval_secs,
            stake_unit: self.stake_unit_ttb as u128 * TICKS_PER_TTB,
            minimum_stake_units: self.minimum_stake_units,
            unstake_delay_secs: self.unstake_delay_secs,
            renewal_period_secs: self.renewal_period_secs,
            staker_split: self.staker_split,
            no_staker_split: self.no_staker_split,
        };
        params.validate()?;
        Ok(params)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_validate_every() -> u64 {
    24
}

fn default_owner() -> String {
    AccountId::repeat(0x01).to_string()
}

fn default_treasury() -> String {
    AccountId::repeat(0x02).to_string()
}

fn default_reserve() -> String {
    AccountId::repeat(0x03).to_string()
}

fn default_custody() -> String {
    AccountId::repeat(0x04).to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_secs: default_poll_interval_secs(),
            validate_every: default_validate_every(),
            owner: default_owner(),
            treasury: default_treasury(),
            reserve: default_reserve(),
            custody: default_custody(),
            genesis_time: None,
            economics: EconomicsConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Parse the configured account ids.
    pub fn accounts(&self) -> Result<EngineAccounts, TickError> {
        Ok(EngineAccounts {
            owner: self.owner.parse()?,
            treasury: self.treasury.parse()?,
            reserve: self.reserve.parse()?,
            custody: self.custody.parse()?,
        })
    }
}
