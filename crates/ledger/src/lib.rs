//! `tally-ledger` — the balance-consistency engine.
//!
//! The engine is the sole authority over account balances: every transaction
//! create/update/delete routes through it, and each mutation commits the row
//! change and the balance change as one atomic store write. The access guard
//! lives here too, so the only way to reach the engine is through a grant it
//! issued.

pub mod engine;
pub mod error;
pub mod guard;

pub use engine::{LedgerEngine, TransactionChange};
pub use error::{LedgerError, LedgerResult};
pub use guard::{AccessGuard, AccountGrant, TransactionGrant};
