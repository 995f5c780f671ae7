// crates/timetick-core/src/error.rs

use thiserror::Error;

use crate::token::Amount;

/// Engine-wide error types for TimeTick.
///
/// Every variant aborts the triggering operation before any engine state is
/// mutated, so callers can fix the precondition and re-invoke.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TickError {
    /// A batch was requested before the batch interval elapsed.
    #[error("Batch not due: {elapsed}s elapsed since last batch, interval is {interval}s")]
    BatchNotDue { elapsed: u64, interval: u64 },

    /// A stake or unstake amount is not an exact multiple of the stake unit.
    #[error("Amount {amount} is not a whole number of stake units ({unit} per unit)")]
    NonWholeUnit { amount: Amount, unit: Amount },

    /// A new stake is below the current minimum unit count.
    #[error("Stake of {units} units is below the minimum of {minimum} units")]
    BelowMinimumStake { units: u64, minimum: u64 },

    /// The caller's ledger balance cannot cover the requested debit.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Unstake attempted without a pending request or before the delay elapsed.
    #[error("Unstake not ready: {0}")]
    UnstakeNotReady(String),

    /// A privileged operation was called by an account that is not the owner.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Staker record or account not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation is not valid in the current engine state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Emission parameters or daemon configuration are inconsistent.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Integer overflow while computing an amount.
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    /// The balance ledger collaborator rejected an operation.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TickError {
    fn from(e: serde_json::Error) -> Self {
        TickError::Serialization(e.to_string())
    }
}
