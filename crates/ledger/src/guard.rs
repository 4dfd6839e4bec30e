//! Access guard: ownership checks ahead of the engine.
//!
//! The guard is the only producer of [`AccountGrant`] and [`TransactionGrant`]
//! (their fields and constructors are private), so engine entry points cannot
//! be reached without the ownership check having run. The check happens once
//! per request; the engine trusts the grant from there.

use tally_core::{Account, AccountId, Transaction, TransactionId, UserId};
use tally_store::LedgerStore;

use crate::error::{LedgerError, LedgerResult};

/// Proof that the acting user owns an account.
#[derive(Debug, Clone)]
pub struct AccountGrant {
    account: Account,
}

impl AccountGrant {
    pub(crate) fn new(account: Account) -> Self {
        Self { account }
    }

    /// The account as it looked when authorized. The engine re-reads the
    /// balance under its own lock; this snapshot is for identity and metadata.
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> AccountId {
        self.account.id
    }

    pub fn owner_id(&self) -> UserId {
        self.account.owner_id
    }
}

/// Proof that the acting user owns a transaction (via its account).
#[derive(Debug, Clone)]
pub struct TransactionGrant {
    transaction: Transaction,
}

impl TransactionGrant {
    pub(crate) fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction.id
    }

    pub fn account_id(&self) -> AccountId {
        self.transaction.account_id
    }
}

/// Verifies the acting identity owns the target before the engine runs.
#[derive(Debug, Clone)]
pub struct AccessGuard<S> {
    store: S,
}

impl<S> AccessGuard<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Authorize `user` against an account. Absent account is
    /// `AccountNotFound`; foreign account is `Forbidden`.
    pub async fn authorize_account(
        &self,
        user: UserId,
        account_id: AccountId,
    ) -> LedgerResult<AccountGrant> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)?;

        if account.owner_id != user {
            return Err(LedgerError::Forbidden);
        }

        Ok(AccountGrant::new(account))
    }

    /// Authorize `user` against a transaction.
    pub async fn authorize_transaction(
        &self,
        user: UserId,
        transaction_id: TransactionId,
    ) -> LedgerResult<TransactionGrant> {
        let transaction = self
            .store
            .transaction_by_id(transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound)?;

        if transaction.owner_id != user {
            return Err(LedgerError::Forbidden);
        }

        Ok(TransactionGrant::new(transaction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_store::InMemoryLedgerStore;

    #[tokio::test]
    async fn owner_gets_a_grant() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let owner = UserId::new();
        let account = Account::new(owner, "Checking", 0).unwrap();
        store.insert_account(&account).await.unwrap();

        let guard = AccessGuard::new(store);
        let grant = guard.authorize_account(owner, account.id).await.unwrap();
        assert_eq!(grant.account_id(), account.id);
    }

    #[tokio::test]
    async fn foreign_user_is_forbidden() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let account = Account::new(UserId::new(), "Checking", 0).unwrap();
        store.insert_account(&account).await.unwrap();

        let guard = AccessGuard::new(store);
        let err = guard
            .authorize_account(UserId::new(), account.id)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::Forbidden);
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let guard = AccessGuard::new(Arc::new(InMemoryLedgerStore::new()));
        let err = guard
            .authorize_account(UserId::new(), AccountId::new())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound);
    }

    #[tokio::test]
    async fn transaction_grant_carries_the_row() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let owner = UserId::new();
        let account = Account::new(owner, "Checking", 0).unwrap();
        store.insert_account(&account).await.unwrap();

        let row = Transaction::new(account.id, owner, 250, Some("rent".into())).unwrap();
        store
            .commit(tally_store::LedgerWrite::Insert {
                row: row.clone(),
                balance: tally_store::BalanceSwap {
                    account_id: account.id,
                    expected: 0,
                    new: 250,
                },
            })
            .await
            .unwrap();

        let guard = AccessGuard::new(store);
        let grant = guard.authorize_transaction(owner, row.id).await.unwrap();
        assert_eq!(grant.transaction(), &row);
        assert_eq!(grant.account_id(), account.id);
    }

    #[tokio::test]
    async fn missing_transaction_is_not_found() {
        let guard = AccessGuard::new(Arc::new(InMemoryLedgerStore::new()));
        let err = guard
            .authorize_transaction(UserId::new(), TransactionId::new())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::TransactionNotFound);
    }
}
