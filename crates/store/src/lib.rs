//! `tally-store` — durable storage boundary for accounts and transactions.
//!
//! This crate defines the [`LedgerStore`] abstraction without making storage
//! assumptions: an in-memory implementation backs tests/dev, a Postgres
//! implementation (behind the `postgres` feature) backs production.
//!
//! The one non-obvious contract is [`LedgerStore::commit`]: a single logical
//! write that applies a transaction-row change *and* the owning account's
//! balance change atomically, so no observer ever sees one without the other.

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use error::StoreError;
pub use memory::InMemoryLedgerStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLedgerStore;
pub use r#trait::{BalanceSwap, LedgerStore, LedgerWrite};
