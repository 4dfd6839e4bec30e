//! Account entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{AccountId, UserId};

/// Maximum account name length (after trimming).
pub const MAX_NAME_LEN: usize = 120;

/// A user-owned account.
///
/// # Invariants
/// - `owner_id` is immutable after creation.
/// - `name` is non-empty and unique per owner (uniqueness enforced by the store).
/// - `balance` is a derived value: it equals the sum of the amounts of the
///   account's live transactions. Only the ledger engine may change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: UserId,
    pub name: String,
    /// Balance in the smallest currency unit.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account for `owner_id`.
    ///
    /// `seed_balance` is the caller-supplied opening balance (defaults to 0 at
    /// the API boundary).
    pub fn new(owner_id: UserId, name: impl Into<String>, seed_balance: i64) -> DomainResult<Self> {
        let name = validate_name(name.into())?;
        let now = Utc::now();

        Ok(Self {
            id: AccountId::new(),
            owner_id,
            name,
            balance: seed_balance,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rename the account. The only direct mutation allowed outside the engine.
    pub fn rename(&mut self, name: impl Into<String>) -> DomainResult<()> {
        self.name = validate_name(name.into())?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_name(name: String) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("account name is required"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "account name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}
