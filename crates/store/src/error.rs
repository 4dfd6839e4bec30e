use thiserror::Error;

/// Storage-layer error.
///
/// Callers map these onto the user-facing taxonomy; the store never surfaces
/// raw driver errors past this boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient infrastructure failure (connection, pool, timeout).
    /// Safe to retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness or referential constraint was violated
    /// (e.g. duplicate account name for the same owner).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A compare-and-swap guard did not match the stored value.
    /// The caller re-reads and retries.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A row the write depends on is absent (deleted concurrently).
    #[error("missing row: {0}")]
    Missing(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::Missing(msg.into())
    }
}
