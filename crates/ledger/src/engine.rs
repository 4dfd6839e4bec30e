//! Balance ledger engine.
//!
//! ## Consistency protocol
//!
//! The read-modify-write of `(current_balance, new_balance)` is the only part
//! of the system that needs isolation. Two layers provide it:
//!
//! 1. **Per-account serialization**: every engine call acquires an async lock
//!    keyed by `AccountId` before reading the balance. Calls against different
//!    accounts proceed fully in parallel; there is no global lock.
//! 2. **Compare-and-swap commit**: the store write carries the balance the
//!    engine read. If an out-of-process writer moved it, the commit conflicts,
//!    nothing is applied, and the engine re-reads and retries a bounded number
//!    of times.
//!
//! Each commit is a single atomic store write (row + balance), so a caller
//! that disconnects mid-operation either sees the full mutation or none of it.
//! Every operation runs under a bounded timeout and surfaces `Unavailable`
//! instead of hanging.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use tally_core::{AccountId, Transaction};
use tally_store::{BalanceSwap, LedgerStore, LedgerWrite, StoreError};

use crate::error::{LedgerError, LedgerResult};
use crate::guard::{AccountGrant, TransactionGrant};

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);
const COMMIT_RETRIES: u32 = 3;

/// Fields of a transaction update request.
///
/// `description` is doubly optional: `None` leaves it untouched,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TransactionChange {
    pub amount: Option<i64>,
    pub description: Option<Option<String>>,
}

impl TransactionChange {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.description.is_none()
    }
}

/// Lock table keyed by account id.
#[derive(Debug, Default)]
struct AccountLocks {
    inner: StdMutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    fn for_account(&self, id: AccountId) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(id).or_default().clone()
    }

    /// Drop the entry for an account that no longer exists. A later call for
    /// the same id just creates a fresh lock.
    fn evict(&self, id: AccountId) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&id);
    }
}

/// The sole authority for changing account balances.
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: S,
    locks: AccountLocks,
    op_timeout: Duration,
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: AccountLocks::default(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Record a new transaction and move the balance by `amount`.
    ///
    /// Returns the committed transaction and the new balance. The account is
    /// re-read under the per-account lock: a missing account is
    /// `AccountNotFound`, never a defaulted zero balance.
    pub async fn apply_create(
        &self,
        grant: &AccountGrant,
        amount: i64,
        description: Option<String>,
    ) -> LedgerResult<(Transaction, i64)> {
        self.bounded(self.create_inner(grant, amount, description))
            .await
    }

    async fn create_inner(
        &self,
        grant: &AccountGrant,
        amount: i64,
        description: Option<String>,
    ) -> LedgerResult<(Transaction, i64)> {
        let account_id = grant.account_id();
        let lock = self.locks.for_account(account_id);
        let _held = lock.lock().await;

        let mut attempt = 0;
        loop {
            let account = self
                .store
                .account_by_id(account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound)?;

            let new_balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::validation("amount overflows the account balance"))?;

            let row = Transaction::new(account_id, grant.owner_id(), amount, description.clone())?;

            let write = LedgerWrite::Insert {
                row: row.clone(),
                balance: BalanceSwap {
                    account_id,
                    expected: account.balance,
                    new: new_balance,
                },
            };

            match self.store.commit(write).await {
                Ok(()) => {
                    tracing::debug!(
                        account_id = %account_id,
                        delta = amount,
                        new_balance,
                        "ledger create committed"
                    );
                    return Ok((row, new_balance));
                }
                Err(StoreError::Conflict(msg)) if attempt < COMMIT_RETRIES => {
                    tracing::warn!(account_id = %account_id, attempt, "ledger commit conflict: {msg}");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Update a transaction's amount and/or description.
    ///
    /// An amount change adjusts the owning account's balance by
    /// `new_amount - old_amount` in the same atomic write and returns the new
    /// balance; a description-only change leaves the account untouched and
    /// returns `None`.
    pub async fn apply_update(
        &self,
        grant: &TransactionGrant,
        change: TransactionChange,
    ) -> LedgerResult<(Transaction, Option<i64>)> {
        if change.is_empty() {
            return Err(LedgerError::validation(
                "at least one of amount or description must be provided",
            ));
        }
        self.bounded(self.update_inner(grant, change)).await
    }

    async fn update_inner(
        &self,
        grant: &TransactionGrant,
        change: TransactionChange,
    ) -> LedgerResult<(Transaction, Option<i64>)> {
        let account_id = grant.account_id();
        let lock = self.locks.for_account(account_id);
        let _held = lock.lock().await;

        let mut attempt = 0;
        loop {
            let current = self
                .store
                .transaction_by_id(grant.transaction_id())
                .await?
                .ok_or(LedgerError::TransactionNotFound)?;

            let swap = match change.amount {
                Some(new_amount) => {
                    let account = self
                        .store
                        .account_by_id(account_id)
                        .await?
                        .ok_or(LedgerError::AccountNotFound)?;

                    let delta = new_amount
                        .checked_sub(current.amount)
                        .ok_or_else(|| LedgerError::validation("amount delta overflows"))?;
                    let new_balance = account.balance.checked_add(delta).ok_or_else(|| {
                        LedgerError::validation("amount overflows the account balance")
                    })?;

                    Some(BalanceSwap {
                        account_id,
                        expected: account.balance,
                        new: new_balance,
                    })
                }
                None => None,
            };

            let mut row = current.clone();
            row.apply_change(change.amount, change.description.clone())?;

            let write = LedgerWrite::Update {
                row: row.clone(),
                balance: swap,
            };

            match self.store.commit(write).await {
                Ok(()) => {
                    tracing::debug!(
                        account_id = %account_id,
                        transaction_id = %row.id,
                        new_balance = swap.map(|s| s.new),
                        "ledger update committed"
                    );
                    return Ok((row, swap.map(|s| s.new)));
                }
                Err(StoreError::Conflict(msg)) if attempt < COMMIT_RETRIES => {
                    tracing::warn!(account_id = %account_id, attempt, "ledger commit conflict: {msg}");
                    attempt += 1;
                }
                Err(StoreError::Missing(_)) => return Err(self.missing_on_commit(grant).await),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete a transaction and subtract its amount from the balance.
    pub async fn apply_delete(&self, grant: &TransactionGrant) -> LedgerResult<i64> {
        self.bounded(self.delete_inner(grant)).await
    }

    async fn delete_inner(&self, grant: &TransactionGrant) -> LedgerResult<i64> {
        let account_id = grant.account_id();
        let lock = self.locks.for_account(account_id);
        let _held = lock.lock().await;

        let mut attempt = 0;
        loop {
            let current = self
                .store
                .transaction_by_id(grant.transaction_id())
                .await?
                .ok_or(LedgerError::TransactionNotFound)?;

            // An account deleted out from under its transaction is an
            // inconsistency; fail closed instead of writing an orphaned
            // balance.
            let account = self
                .store
                .account_by_id(account_id)
                .await?
                .ok_or(LedgerError::AccountNotFound)?;

            let new_balance = account
                .balance
                .checked_sub(current.amount)
                .ok_or_else(|| LedgerError::validation("amount overflows the account balance"))?;

            let write = LedgerWrite::Delete {
                id: current.id,
                balance: BalanceSwap {
                    account_id,
                    expected: account.balance,
                    new: new_balance,
                },
            };

            match self.store.commit(write).await {
                Ok(()) => {
                    tracing::debug!(
                        account_id = %account_id,
                        transaction_id = %current.id,
                        delta = -current.amount,
                        new_balance,
                        "ledger delete committed"
                    );
                    return Ok(new_balance);
                }
                Err(StoreError::Conflict(msg)) if attempt < COMMIT_RETRIES => {
                    tracing::warn!(account_id = %account_id, attempt, "ledger commit conflict: {msg}");
                    attempt += 1;
                }
                Err(StoreError::Missing(_)) => return Err(self.missing_on_commit(grant).await),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete an account and all of its transactions as one atomic step.
    ///
    /// The cascade is an explicit, engine-visible operation rather than a
    /// store trigger, so it serializes with the account's other mutations.
    pub async fn delete_account(&self, grant: &AccountGrant) -> LedgerResult<()> {
        let account_id = grant.account_id();
        self.bounded(async {
            let lock = self.locks.for_account(account_id);
            let _held = lock.lock().await;

            match self.store.delete_account_cascade(account_id).await {
                Ok(()) => {
                    self.locks.evict(account_id);
                    tracing::debug!(account_id = %account_id, "account cascade delete committed");
                    Ok(())
                }
                Err(StoreError::Missing(_)) => Err(LedgerError::AccountNotFound),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// A commit reported a missing row: work out which entity is gone.
    async fn missing_on_commit(&self, grant: &TransactionGrant) -> LedgerError {
        match self.store.transaction_by_id(grant.transaction_id()).await {
            Ok(None) => LedgerError::TransactionNotFound,
            Ok(Some(_)) => LedgerError::AccountNotFound,
            Err(e) => e.into(),
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| LedgerError::unavailable("ledger operation timed out"))?
    }
}
