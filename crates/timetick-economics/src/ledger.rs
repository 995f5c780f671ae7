// crates/timetick-economics/src/ledger.rs
//
// In-memory balance ledger.
//
// Used by the daemon when no external ledger is attached, and by tests. Tracks
// per-account balances and the total issued supply. Every debit is checked
// before any balance changes, and `apply` commits a whole op list or nothing.

use std::collections::HashMap;

use timetick_core::token::Amount;
use timetick_core::{AccountId, BalanceLedger, LedgerOp, TickError};

/// A `BalanceLedger` backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<AccountId, Amount>,
    total_supply: Amount,
}

impl InMemoryLedger {
    /// Create an empty ledger with zero supply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit newly issued funds to an account.
    pub fn mint(&mut self, to: &AccountId, amount: Amount) -> Result<(), TickError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| TickError::Ledger(format!("Minting {} overflows supply", amount)))?;
        let balance = self.balance_of(to).checked_add(amount).ok_or_else(|| {
            TickError::Ledger(format!("Minting {} overflows balance of {}", amount, to))
        })?;
        self.balances.insert(*to, balance);
        self.total_supply = supply;
        Ok(())
    }

    /// Move funds between accounts.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TickError> {
        let available = self.balance_of(from);
        if amount > available {
            return Err(TickError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        self.balances.insert(*from, available - amount);
        // Cannot overflow: the sum of all balances is bounded by total supply.
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }
}

impl BalanceLedger for InMemoryLedger {
    fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> Amount {
        self.total_supply
    }

    fn apply(&mut self, ops: &[LedgerOp]) -> Result<(), TickError> {
        let mut scratch = self.clone();
        for op in ops {
            match op {
                LedgerOp::Mint { to, amount } => scratch.mint(to, *amount)?,
                LedgerOp::Transfer { from, to, amount } => scratch.transfer(from, to, *amount)?,
            }
        }
        *self = scratch;
        Ok(())
    }
}
