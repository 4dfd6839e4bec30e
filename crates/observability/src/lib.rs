//! Shared observability setup for ledger binaries.

/// Install the process-wide tracing subscriber.
///
/// Idempotent; calling it again after a subscriber is installed does nothing.
pub fn init() {
    tracing::init();
}

/// Subscriber construction (env filter, JSON formatting).
pub mod tracing;
