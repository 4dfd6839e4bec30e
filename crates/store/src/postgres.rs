//! Postgres-backed ledger store.
//!
//! ## Atomicity
//!
//! `commit()` runs the transaction-row write and the balance write inside a
//! single SQL transaction. The balance write is a compare-and-swap
//! (`... WHERE id = $1 AND balance = $expected`); if the guard does not match,
//! nothing is committed and the caller sees [`StoreError::Conflict`].
//!
//! ## Error Mapping
//!
//! SQLx errors map onto [`StoreError`] as follows:
//!
//! | PostgreSQL error code | StoreError     | Scenario                               |
//! |-----------------------|----------------|----------------------------------------|
//! | `23505`               | `Constraint`   | duplicate account name for an owner    |
//! | `23503`               | `Missing`      | referenced account row gone            |
//! | other database errors | `Unavailable`  | backend fault                          |
//! | pool closed/timeout   | `Unavailable`  | transient infrastructure failure       |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;

use tally_core::{Account, AccountId, Transaction, TransactionId, UserId};

use crate::error::StoreError;
use crate::r#trait::{BalanceSwap, LedgerStore, LedgerWrite};

/// Statements to bring up the schema on an empty database.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          UUID PRIMARY KEY,
    owner_id    UUID NOT NULL,
    name        VARCHAR(120) NOT NULL,
    balance     BIGINT NOT NULL DEFAULT 0,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS transactions (
    id          UUID PRIMARY KEY,
    account_id  UUID NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
    owner_id    UUID NOT NULL,
    amount      BIGINT NOT NULL,
    description VARCHAR(255),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS transactions_account_created
    ON transactions (account_id, created_at, id);
"#;

/// Postgres implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect with a bounded acquire timeout so a dead backend surfaces as
    /// `Unavailable` instead of hanging callers.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the baseline schema (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Execute the balance CAS inside `tx`, distinguishing a moved balance
    /// from a deleted account.
    async fn swap_balance(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        swap: BalanceSwap,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1, updated_at = NOW()
            WHERE id = $2 AND balance = $3
            "#,
        )
        .bind(swap.new)
        .bind(swap.account_id.as_uuid())
        .bind(swap.expected)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("swap_balance", e))?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM accounts WHERE id = $1")
            .bind(swap.account_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("swap_balance", e))?;

        if exists.is_some() {
            Err(StoreError::conflict(format!(
                "account {} balance moved past {}",
                swap.account_id, swap.expected
            )))
        } else {
            Err(StoreError::missing(format!("account {}", swap.account_id)))
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, name, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.owner_id.as_uuid())
        .bind(&account.name)
        .bind(account.balance)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_by_id", e))?;

        row.map(account_from_row).transpose()
    }

    #[instrument(skip(self, name))]
    async fn account_by_name(
        &self,
        owner_id: UserId,
        name: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM accounts
            WHERE owner_id = $1 AND name = $2
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_by_name", e))?;

        row.map(account_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn accounts_by_owner(&self, owner_id: UserId) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, name, balance, created_at, updated_at
            FROM accounts
            WHERE owner_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts_by_owner", e))?;

        rows.into_iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn rename_account(&self, account: &Account) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET name = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(&account.name)
        .bind(account.updated_at)
        .bind(account.id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("rename_account", e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::missing(format!("account {}", account.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_account_cascade(&self, id: AccountId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("delete_account_cascade", e))?;

        // The engine issues the cascade explicitly; the FK ON DELETE CASCADE
        // is defense in depth, not the mechanism.
        sqlx::query("DELETE FROM transactions WHERE account_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_account_cascade", e))?;

        let deleted = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_account_cascade", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::missing(format!("account {id}")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_account_cascade", e))
    }

    #[instrument(skip(self))]
    async fn transaction_by_id(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, owner_id, amount, description, created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transaction_by_id", e))?;

        row.map(transaction_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn transactions_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, owner_id, amount, description, created_at, updated_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions_by_account", e))?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    #[instrument(skip(self, write), fields(account_id = %write.account_id()))]
    async fn commit(&self, write: LedgerWrite) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        match write {
            LedgerWrite::Insert { row, balance } => {
                Self::swap_balance(&mut tx, balance).await?;

                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (id, account_id, owner_id, amount, description, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(row.id.as_uuid())
                .bind(row.account_id.as_uuid())
                .bind(row.owner_id.as_uuid())
                .bind(row.amount)
                .bind(&row.description)
                .bind(row.created_at)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("commit", e))?;
            }
            LedgerWrite::Update { row, balance } => {
                if let Some(balance) = balance {
                    Self::swap_balance(&mut tx, balance).await?;
                }

                let updated = sqlx::query(
                    r#"
                    UPDATE transactions
                    SET amount = $1, description = $2, updated_at = $3
                    WHERE id = $4
                    "#,
                )
                .bind(row.amount)
                .bind(&row.description)
                .bind(row.updated_at)
                .bind(row.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("commit", e))?;

                if updated.rows_affected() == 0 {
                    return Err(StoreError::missing(format!("transaction {}", row.id)));
                }
            }
            LedgerWrite::Delete { id, balance } => {
                Self::swap_balance(&mut tx, balance).await?;

                let deleted = sqlx::query("DELETE FROM transactions WHERE id = $1")
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("commit", e))?;

                if deleted.rows_affected() == 0 {
                    return Err(StoreError::missing(format!("transaction {id}")));
                }
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

fn account_from_row(row: sqlx::postgres::PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::from_uuid(get(&row, "id")?),
        owner_id: UserId::from_uuid(get(&row, "owner_id")?),
        name: get(&row, "name")?,
        balance: get(&row, "balance")?,
        created_at: get::<DateTime<Utc>>(&row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(&row, "updated_at")?,
    })
}

fn transaction_from_row(row: sqlx::postgres::PgRow) -> Result<Transaction, StoreError> {
    Ok(Transaction {
        id: TransactionId::from_uuid(get(&row, "id")?),
        account_id: AccountId::from_uuid(get(&row, "account_id")?),
        owner_id: UserId::from_uuid(get(&row, "owner_id")?),
        amount: get(&row, "amount")?,
        description: get(&row, "description")?,
        created_at: get::<DateTime<Utc>>(&row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(&row, "updated_at")?,
    })
}

fn get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::unavailable(format!("failed to decode column {column}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // Unique violation (owner_id, name)
                Some("23505") => StoreError::Constraint(msg),
                // Foreign key violation: referenced account row is gone
                Some("23503") => StoreError::Missing(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::unavailable(format!("timed out acquiring a connection in {operation}"))
        }
        _ => StoreError::unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
