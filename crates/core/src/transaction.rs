//! Transaction entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{AccountId, TransactionId, UserId};

/// Maximum description length (matches the persisted column width).
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// A single ledger entry against an account.
///
/// # Invariants
/// - `account_id` and `owner_id` are immutable after creation; `owner_id`
///   always matches the owning account's owner.
/// - `amount` is signed: positive is a credit, negative a debit. Zero is
///   permitted and contributes nothing to the balance.
/// - `updated_at` is refreshed on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub owner_id: UserId,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        owner_id: UserId,
        amount: i64,
        description: Option<String>,
    ) -> DomainResult<Self> {
        let description = validate_description(description)?;
        let now = Utc::now();

        Ok(Self {
            id: TransactionId::new(),
            account_id,
            owner_id,
            amount,
            description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an update to amount and/or description, refreshing `updated_at`.
    ///
    /// The balance delta implied by an amount change is the engine's concern;
    /// this only mutates the row.
    pub fn apply_change(
        &mut self,
        amount: Option<i64>,
        description: Option<Option<String>>,
    ) -> DomainResult<()> {
        if amount.is_none() && description.is_none() {
            return Err(DomainError::validation(
                "at least one of amount or description must be provided",
            ));
        }

        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(description) = description {
            self.description = validate_description(description)?;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_description(description: Option<String>) -> DomainResult<Option<String>> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(DomainError::validation(
            format!("description exceeds {MAX_DESCRIPTION_LEN} characters"),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amount_is_permitted() {
        let t = Transaction::new(AccountId::new(), UserId::new(), 0, None).unwrap();
        assert_eq!(t.amount, 0);
    }

    #[test]
    fn overlong_description_rejected() {
        let description = Some("x".repeat(MAX_DESCRIPTION_LEN + 1));
        let err = Transaction::new(AccountId::new(), UserId::new(), 100, description).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn change_requires_at_least_one_field() {
        let mut t = Transaction::new(AccountId::new(), UserId::new(), 100, None).unwrap();
        let err = t.apply_change(None, None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(t.amount, 100);
    }

    #[test]
    fn change_updates_amount_and_timestamp() {
        let mut t = Transaction::new(AccountId::new(), UserId::new(), 100, None).unwrap();
        let before = t.updated_at;
        t.apply_change(Some(250), None).unwrap();
        assert_eq!(t.amount, 250);
        assert!(t.updated_at >= before);
    }

    #[test]
    fn description_can_be_cleared() {
        let mut t =
            Transaction::new(AccountId::new(), UserId::new(), 100, Some("rent".into())).unwrap();
        t.apply_change(None, Some(None)).unwrap();
        assert_eq!(t.description, None);
    }
}
