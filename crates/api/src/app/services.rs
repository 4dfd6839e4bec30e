//! Store selection and the mutation façade.
//!
//! `AppServices` owns the explicitly constructed store client plus the guard
//! and engine built on top of it (no process-wide handles; everything is
//! injected at startup). Its methods are the caller-facing operations: each
//! validates shape, runs the access guard, invokes the engine or store, and
//! returns a typed result.

use std::sync::Arc;

use tally_core::{Account, AccountId, Transaction, TransactionId, UserId};
use tally_ledger::{AccessGuard, LedgerEngine, LedgerError, LedgerResult, TransactionChange};
use tally_store::{InMemoryLedgerStore, LedgerStore};

type SharedStore = Arc<dyn LedgerStore>;

pub struct AppServices {
    store: SharedStore,
    guard: AccessGuard<SharedStore>,
    engine: LedgerEngine<SharedStore>,
}

/// Wire services from the environment: `USE_PERSISTENT_STORES=true` selects
/// Postgres (requires `DATABASE_URL`), anything else the in-memory store.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_postgres_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
        );
    }

    AppServices::new(Arc::new(InMemoryLedgerStore::new()))
}

#[cfg(feature = "postgres")]
async fn build_postgres_services() -> AppServices {
    use std::time::Duration;
    use tally_store::PostgresLedgerStore;

    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let store = PostgresLedgerStore::connect(&database_url, Duration::from_secs(5))
        .await
        .expect("failed to connect to Postgres");
    store
        .ensure_schema()
        .await
        .expect("failed to apply ledger schema");

    AppServices::new(Arc::new(store))
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            engine: LedgerEngine::new(store.clone()),
            store,
        }
    }

    // ---- accounts ----

    pub async fn create_account(
        &self,
        user: UserId,
        name: &str,
        seed_balance: Option<i64>,
    ) -> LedgerResult<Account> {
        let account = Account::new(user, name, seed_balance.unwrap_or(0))?;
        self.store.insert_account(&account).await?;
        Ok(account)
    }

    pub async fn list_accounts(&self, user: UserId) -> LedgerResult<Vec<Account>> {
        Ok(self.store.accounts_by_owner(user).await?)
    }

    pub async fn rename_account(
        &self,
        user: UserId,
        account_id: AccountId,
        name: &str,
    ) -> LedgerResult<Account> {
        let grant = self.guard.authorize_account(user, account_id).await?;

        let mut account = grant.account().clone();
        account.rename(name)?;
        self.store.rename_account(&account).await?;
        Ok(account)
    }

    pub async fn delete_account(&self, user: UserId, account_id: AccountId) -> LedgerResult<()> {
        let grant = self.guard.authorize_account(user, account_id).await?;
        self.engine.delete_account(&grant).await
    }

    // ---- transactions ----

    pub async fn create_transaction(
        &self,
        user: UserId,
        account_id: AccountId,
        amount: i64,
        description: Option<String>,
    ) -> LedgerResult<(Transaction, i64)> {
        let grant = self.guard.authorize_account(user, account_id).await?;
        self.engine.apply_create(&grant, amount, description).await
    }

    /// List one account's transactions, creation time ascending. Reads the
    /// stored rows only; no balance computation happens here.
    pub async fn list_transactions(
        &self,
        user: UserId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<Transaction>> {
        let grant = self.guard.authorize_account(user, account_id).await?;
        Ok(self.store.transactions_by_account(grant.account_id()).await?)
    }

    pub async fn update_transaction(
        &self,
        user: UserId,
        transaction_id: TransactionId,
        change: TransactionChange,
    ) -> LedgerResult<(Transaction, Option<i64>)> {
        if change.is_empty() {
            return Err(LedgerError::validation(
                "at least one of amount or description must be provided",
            ));
        }

        let grant = self.guard.authorize_transaction(user, transaction_id).await?;
        self.engine.apply_update(&grant, change).await
    }

    pub async fn delete_transaction(
        &self,
        user: UserId,
        transaction_id: TransactionId,
    ) -> LedgerResult<i64> {
        let grant = self.guard.authorize_transaction(user, transaction_id).await?;
        self.engine.apply_delete(&grant).await
    }
}
