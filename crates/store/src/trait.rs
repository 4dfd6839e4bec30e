use async_trait::async_trait;
use std::sync::Arc;

use tally_core::{Account, AccountId, Transaction, TransactionId, UserId};

use crate::error::StoreError;

/// Compare-and-swap guard for an account balance write.
///
/// The write only applies when the stored balance still equals `expected`;
/// otherwise the store returns [`StoreError::Conflict`] and applies nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSwap {
    pub account_id: AccountId,
    pub expected: i64,
    pub new: i64,
}

/// One atomic ledger commit: a transaction-row change plus the matching
/// balance adjustment. Either both apply or neither does.
#[derive(Debug, Clone)]
pub enum LedgerWrite {
    /// Insert a new transaction and swap the owning account's balance.
    Insert {
        row: Transaction,
        balance: BalanceSwap,
    },
    /// Rewrite an existing transaction row. `balance` is present only when the
    /// amount changed; a description-only update leaves the account untouched.
    Update {
        row: Transaction,
        balance: Option<BalanceSwap>,
    },
    /// Remove a transaction and swap the owning account's balance.
    Delete {
        id: TransactionId,
        balance: BalanceSwap,
    },
}

impl LedgerWrite {
    /// The account this write belongs to (for logging and lock keying).
    pub fn account_id(&self) -> AccountId {
        match self {
            LedgerWrite::Insert { row, .. } | LedgerWrite::Update { row, .. } => row.account_id,
            LedgerWrite::Delete { balance, .. } => balance.account_id,
        }
    }
}

/// Durable key-addressed storage for accounts and transactions.
///
/// ## Atomicity
///
/// `commit()` and `delete_account_cascade()` are atomic multi-row writes: a
/// single logical operation either fully applies or fully fails, with no
/// observer seeing a partial result.
///
/// ## Ordering
///
/// `transactions_by_account()` returns rows ordered by creation time ascending
/// (ties broken by id) so listings are stable and repeatable.
///
/// ## Failure
///
/// An unreachable backend surfaces as [`StoreError::Unavailable`]; a duplicate
/// account name as [`StoreError::Constraint`]; a failed balance CAS as
/// [`StoreError::Conflict`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ---- accounts ----

    /// Insert a new account. Fails with `Constraint` when the owner already
    /// has an account with the same name.
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn account_by_name(
        &self,
        owner_id: UserId,
        name: &str,
    ) -> Result<Option<Account>, StoreError>;

    async fn accounts_by_owner(&self, owner_id: UserId) -> Result<Vec<Account>, StoreError>;

    /// Persist a rename (`name` + `updated_at` from the given entity).
    async fn rename_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Delete an account and all of its transactions atomically.
    async fn delete_account_cascade(&self, id: AccountId) -> Result<(), StoreError>;

    // ---- transactions ----

    async fn transaction_by_id(&self, id: TransactionId)
        -> Result<Option<Transaction>, StoreError>;

    async fn transactions_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError>;

    // ---- atomic ledger commit ----

    /// Apply one [`LedgerWrite`] atomically. Used exclusively by the ledger
    /// engine; nothing else combines a transaction write with a balance write.
    async fn commit(&self, write: LedgerWrite) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        (**self).insert_account(account).await
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).account_by_id(id).await
    }

    async fn account_by_name(
        &self,
        owner_id: UserId,
        name: &str,
    ) -> Result<Option<Account>, StoreError> {
        (**self).account_by_name(owner_id, name).await
    }

    async fn accounts_by_owner(&self, owner_id: UserId) -> Result<Vec<Account>, StoreError> {
        (**self).accounts_by_owner(owner_id).await
    }

    async fn rename_account(&self, account: &Account) -> Result<(), StoreError> {
        (**self).rename_account(account).await
    }

    async fn delete_account_cascade(&self, id: AccountId) -> Result<(), StoreError> {
        (**self).delete_account_cascade(id).await
    }

    async fn transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        (**self).transaction_by_id(id).await
    }

    async fn transactions_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        (**self).transactions_by_account(account_id).await
    }

    async fn commit(&self, write: LedgerWrite) -> Result<(), StoreError> {
        (**self).commit(write).await
    }
}
