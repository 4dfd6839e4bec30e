//! In-memory ledger store.
//!
//! Intended for tests/dev. Atomicity of `commit` and the cascade delete comes
//! from holding the single write lock for the whole multi-row operation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use tally_core::{Account, AccountId, Transaction, TransactionId, UserId};

use crate::error::StoreError;
use crate::r#trait::{BalanceSwap, LedgerStore, LedgerWrite};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_swap(state: &mut State, swap: BalanceSwap) -> Result<(), StoreError> {
        let account = state
            .accounts
            .get_mut(&swap.account_id)
            .ok_or_else(|| StoreError::missing(format!("account {}", swap.account_id)))?;

        if account.balance != swap.expected {
            return Err(StoreError::conflict(format!(
                "account {} balance moved (expected {}, found {})",
                swap.account_id, swap.expected, account.balance
            )));
        }

        account.balance = swap.new;
        account.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = write_lock(&self.inner)?;

        let duplicate = state
            .accounts
            .values()
            .any(|a| a.owner_id == account.owner_id && a.name == account.name);
        if duplicate {
            return Err(StoreError::constraint(format!(
                "account name '{}' already exists for owner",
                account.name
            )));
        }

        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let state = read_lock(&self.inner)?;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn account_by_name(
        &self,
        owner_id: UserId,
        name: &str,
    ) -> Result<Option<Account>, StoreError> {
        let state = read_lock(&self.inner)?;
        Ok(state
            .accounts
            .values()
            .find(|a| a.owner_id == owner_id && a.name == name)
            .cloned())
    }

    async fn accounts_by_owner(&self, owner_id: UserId) -> Result<Vec<Account>, StoreError> {
        let state = read_lock(&self.inner)?;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| (a.created_at, a.id.as_uuid()).cmp(&(b.created_at, b.id.as_uuid())));
        Ok(accounts)
    }

    async fn rename_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = write_lock(&self.inner)?;

        let duplicate = state
            .accounts
            .values()
            .any(|a| a.owner_id == account.owner_id && a.name == account.name && a.id != account.id);
        if duplicate {
            return Err(StoreError::constraint(format!(
                "account name '{}' already exists for owner",
                account.name
            )));
        }

        let stored = state
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| StoreError::missing(format!("account {}", account.id)))?;
        stored.name = account.name.clone();
        stored.updated_at = account.updated_at;
        Ok(())
    }

    async fn delete_account_cascade(&self, id: AccountId) -> Result<(), StoreError> {
        let mut state = write_lock(&self.inner)?;

        if state.accounts.remove(&id).is_none() {
            return Err(StoreError::missing(format!("account {id}")));
        }
        state.transactions.retain(|_, t| t.account_id != id);
        Ok(())
    }

    async fn transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let state = read_lock(&self.inner)?;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn transactions_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = read_lock(&self.inner)?;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.created_at, a.id.as_uuid()).cmp(&(b.created_at, b.id.as_uuid())));
        Ok(rows)
    }

    async fn commit(&self, write: LedgerWrite) -> Result<(), StoreError> {
        let mut state = write_lock(&self.inner)?;

        // Validate the whole write before mutating anything, so a failure
        // leaves the state untouched (all-or-nothing).
        match write {
            LedgerWrite::Insert { row, balance } => {
                Self::apply_swap(&mut state, balance)?;
                state.transactions.insert(row.id, row);
            }
            LedgerWrite::Update { row, balance } => {
                if !state.transactions.contains_key(&row.id) {
                    return Err(StoreError::missing(format!("transaction {}", row.id)));
                }
                if let Some(balance) = balance {
                    Self::apply_swap(&mut state, balance)?;
                }
                state.transactions.insert(row.id, row);
            }
            LedgerWrite::Delete { id, balance } => {
                if !state.transactions.contains_key(&id) {
                    return Err(StoreError::missing(format!("transaction {id}")));
                }
                Self::apply_swap(&mut state, balance)?;
                state.transactions.remove(&id);
            }
        }

        Ok(())
    }
}

fn read_lock(lock: &RwLock<State>) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::unavailable("store lock poisoned"))
}

fn write_lock(lock: &RwLock<State>) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::unavailable("store lock poisoned"))
}
