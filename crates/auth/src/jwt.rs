//! HS256 bearer token encoding/decoding.
//!
//! Time-window checks are delegated to [`validate_claims`] so the rules stay
//! deterministic and testable without real keys.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Validates a bearer token and yields the trusted claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 (shared-secret) token validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window lives in our own claims (issued_at/expires_at) and is
        // checked by `validate_claims`, not by the jwt library.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|_| TokenValidationError::Invalid)?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// HS256 token signer.
///
/// Used by the upstream session issuer and by tests to mint tokens; the
/// service itself only validates.
pub struct Hs256JwtSigner {
    key: EncodingKey,
}

impl Hs256JwtSigner {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            key: EncodingKey::from_secret(&secret),
        }
    }

    pub fn sign(&self, claims: &JwtClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|_| TokenValidationError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::UserId;

    fn claims_now(user: UserId) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: user,
            issued_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn round_trip_with_matching_secret() {
        let secret = b"test-secret".to_vec();
        let user = UserId::new();

        let token = Hs256JwtSigner::new(secret.clone())
            .sign(&claims_now(user))
            .unwrap();
        let claims = Hs256JwtValidator::new(secret)
            .validate(&token, Utc::now())
            .unwrap();

        assert_eq!(claims.sub, user);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = Hs256JwtSigner::new(b"secret-a".to_vec())
            .sign(&claims_now(UserId::new()))
            .unwrap();

        let err = Hs256JwtValidator::new(b"secret-b".to_vec())
            .validate(&token, Utc::now())
            .unwrap_err();
        assert_eq!(err, TokenValidationError::Invalid);
    }

    #[test]
    fn expired_token_rejected_on_validate() {
        let secret = b"test-secret".to_vec();
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            issued_at: now - Duration::minutes(20),
            expires_at: now - Duration::minutes(10),
        };

        let token = Hs256JwtSigner::new(secret.clone()).sign(&claims).unwrap();
        let err = Hs256JwtValidator::new(secret)
            .validate(&token, now)
            .unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }

    #[test]
    fn garbage_token_rejected() {
        let err = Hs256JwtValidator::new(b"test-secret".to_vec())
            .validate("not-a-jwt", Utc::now())
            .unwrap_err();
        assert_eq!(err, TokenValidationError::Invalid);
    }
}
