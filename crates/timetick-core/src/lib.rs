// crates/timetick-core/src/lib.rs
//
// timetick-core: Core types, collaborator traits, and the error type for the
// TimeTick emission engine.
//
// This is the leaf crate the rest of the workspace depends on. It defines the
// amount and account types, the balance ledger and clock interfaces the engine
// calls into, and the engine-wide error enum.

pub mod account;
pub mod clock;
pub mod error;
pub mod token;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
pub use account::AccountId;
pub use clock::{ManualClock, SystemClock};
pub use error::TickError;
pub use token::{Amount, Ttb, SECONDS_PER_DAY, SECONDS_PER_HOUR, TICKS_PER_TTB};
pub use traits::{BalanceLedger, Clock, LedgerOp};
