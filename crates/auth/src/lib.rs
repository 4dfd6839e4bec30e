//! `tally-auth` — authentication boundary for the ledger service.
//!
//! This crate is intentionally decoupled from HTTP and storage: it models the
//! claims the service trusts and how bearer tokens are validated. Session
//! issuance (registration, credential verification) happens upstream; the core
//! only ever sees a resolved [`tally_core::UserId`].

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtSigner, Hs256JwtValidator, JwtValidator};
