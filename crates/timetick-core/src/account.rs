// crates/timetick-core/src/account.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TickError;

/// A 32-byte account identifier on the balance ledger.
///
/// Ordered so that staker iteration is deterministic: proportional shares and
/// expiry sweeps always visit accounts in the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Build an id with every byte set to `b`. Handy for fixtures.
    pub fn repeat(b: u8) -> Self {
        Self([b; 32])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = TickError;

    /// Parse a 64-character hex string, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| TickError::InvalidConfig(format!("Invalid account hex '{}': {}", s, e)))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            TickError::InvalidConfig(format!(
                "Account id must be 32 bytes, got {} bytes",
                v.len()
            ))
        })?;
        Ok(Self(arr))
    }
}
