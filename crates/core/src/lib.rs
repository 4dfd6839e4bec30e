//! `tally-core` — domain foundation for the personal ledger.
//!
//! This crate contains **pure domain** types (no storage or HTTP concerns):
//! strongly-typed identifiers, the domain error model, and the `Account` and
//! `Transaction` entities with their validation rules.

pub mod account;
pub mod error;
pub mod id;
pub mod transaction;

pub use account::Account;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, TransactionId, UserId};
pub use transaction::Transaction;
