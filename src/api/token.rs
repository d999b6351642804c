//! Session token issuance and verification.
//!
//! Tokens are HS256-signed JWTs carrying a minimal claim set: subject id,
//! email, expiry. No role or permission data is embedded; anything beyond
//! "is this a known, unexpired identity" is decided by downstream handlers.
//! There is no server-side session table or revocation list, so the service
//! scales horizontally without shared session storage and expiry is the
//! only termination mechanism.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Identity claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier (employee id)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced exactly, not within a clock-drift window
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Issue a signed token for the given identity, expiring after the
    /// configured TTL.
    pub fn issue(&self, subject_id: &str, email: &str) -> Result<String> {
        self.issue_with_ttl(subject_id, email, self.ttl)
    }

    /// Issue a token with an explicit lifetime.
    pub fn issue_with_ttl(&self, subject_id: &str, email: &str, ttl: Duration) -> Result<String> {
        let claims = Claims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).context("Failed to encode token")
    }

    /// Verify a token's signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 24,
        })
    }

    #[test]
    fn test_issue_verify_round_trip() {
        let tokens = service();
        let token = tokens.issue("emp-42", "ada@example.com").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "emp-42");
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = service();
        let token = tokens.issue("emp-42", "ada@example.com").unwrap();

        // Flip a character in the signature segment
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert_eq!(tokens.verify(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let tokens = service();
        assert_eq!(tokens.verify("not-a-jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let tokens = service();
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            token_ttl_hours: 24,
        });

        let token = other.issue("emp-42", "ada@example.com").unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        let token = tokens
            .issue_with_ttl("emp-42", "ada@example.com", Duration::seconds(-60))
            .unwrap();

        assert_eq!(tokens.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_just_before_expiry_accepted() {
        let tokens = service();
        let token = tokens
            .issue_with_ttl("emp-42", "ada@example.com", Duration::seconds(1))
            .unwrap();

        assert!(tokens.verify(&token).is_ok());
    }
}
