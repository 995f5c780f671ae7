// crates/timetick-core/src/traits.rs

use crate::account::AccountId;
use crate::error::TickError;
use crate::token::Amount;

/// One balance change requested by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    /// Credit newly issued funds, increasing total supply.
    Mint { to: AccountId, amount: Amount },
    /// Move funds between accounts. Total supply is unchanged.
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
}

/// Trait for the fungible balance ledger the engine mints into and moves
/// custody funds through.
///
/// Implemented by timetick-economics (`InMemoryLedger`) and by any host that
/// already owns account balances.
pub trait BalanceLedger: Send + Sync {
    /// Current balance of an account. Unknown accounts hold zero.
    fn balance_of(&self, account: &AccountId) -> Amount;

    /// Total amount ever issued minus amounts burned.
    fn total_supply(&self) -> Amount;

    /// Apply `ops` in order as one unit.
    ///
    /// Either every op takes effect or none does. A transfer that the
    /// balance at that point in the sequence cannot cover fails with
    /// `TickError::InsufficientBalance`.
    fn apply(&mut self, ops: &[LedgerOp]) -> Result<(), TickError>;
}

/// Trait for the time source.
///
/// The engine only ever reads the clock; it never advances it.
pub trait Clock: Send + Sync {
    /// Current time in unix seconds.
    fn now(&self) -> u64;
}
