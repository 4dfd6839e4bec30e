use thiserror::Error;

use tally_core::DomainError;
use tally_store::StoreError;

/// Result type used across the ledger layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// User-facing error taxonomy for ledger operations.
///
/// Every façade path ends in either an entity/new balance or exactly one of
/// these; raw store errors never escape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or missing input. Caller-fixable; do not retry as-is.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The target account does not resolve.
    #[error("account not found")]
    AccountNotFound,

    /// The target transaction does not resolve.
    #[error("transaction not found")]
    TransactionNotFound,

    /// The acting user does not own the target. Surfaced to callers as
    /// not-found so existence is not leaked.
    #[error("forbidden")]
    Forbidden,

    /// A uniqueness constraint was violated (e.g. duplicate account name).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Transient infrastructure failure. Safe to retry with backoff; whether
    /// the prior attempt committed must be checked by the caller.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => LedgerError::Unavailable(msg),
            StoreError::Constraint(msg) => LedgerError::Constraint(msg),
            // A conflict that survives the engine's retries behaves like a
            // transient fault: the caller may retry.
            StoreError::Conflict(msg) => LedgerError::Unavailable(msg),
            // A row that vanished mid-write; the engine fails closed rather
            // than writing an orphaned balance.
            StoreError::Missing(_) => LedgerError::AccountNotFound,
        }
    }
}
