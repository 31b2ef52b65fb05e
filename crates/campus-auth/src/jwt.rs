//! JWT validation and claims extraction.
//!
//! This module provides signature verification and claims validation for HS256
//! tokens whose `sub` claim is the numeric user id.

use async_trait::async_trait;
use campus_core::UserId;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Validated claims extracted from a JWT.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedClaims {
    /// The user ID from the `sub` claim.
    pub user_id: UserId,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

/// Trait for validating JWTs.
#[async_trait]
pub trait JwtValidator: Send + Sync {
    /// Validate a JWT and extract claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid, expired, or cannot be validated.
    async fn validate(&self, token: &str) -> Result<ValidatedClaims>;
}

/// Raw claims from a JWT before validation.
#[derive(Debug, Serialize, Deserialize)]
struct RawClaims {
    /// Subject (user id as a decimal string)
    sub: String,
    /// Expiration timestamp
    exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

/// Shared-secret (HS256) JWT validator.
pub struct Hs256Validator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256Validator {
    /// Create a validator from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Misconfigured` if the secret is empty.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::Misconfigured("empty signing secret".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.validate_exp = true;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }
}

#[async_trait]
impl JwtValidator for Hs256Validator {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let token_data = decode::<RawClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = token_data.claims;
        let user_id: UserId = claims.sub.parse().map_err(|_| AuthError::InvalidUserId)?;

        let exp_secs = i64::try_from(claims.exp).unwrap_or(i64::MAX);
        let expires_at = DateTime::from_timestamp(exp_secs, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid exp timestamp".to_string()))?;

        Ok(ValidatedClaims {
            user_id,
            expires_at,
        })
    }
}

/// Sign a token for `user_id` that the HS256 validator built from `config` accepts.
///
/// # Errors
///
/// Returns an error if encoding fails.
#[cfg(any(test, feature = "test-utils"))]
pub fn mint_token(config: &AuthConfig, user_id: UserId, ttl: chrono::Duration) -> Result<String> {
    let now = Utc::now();
    let claims = RawClaims {
        sub: user_id.to_string(),
        exp: u64::try_from((now + ttl).timestamp()).unwrap_or(0),
        iat: u64::try_from(now.timestamp()).ok(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// A mock JWT validator for testing.
///
/// This validator accepts any token in the format `test-token:<user_id>`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockJwtValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl JwtValidator for MockJwtValidator {
    async fn validate(&self, token: &str) -> Result<ValidatedClaims> {
        let rest = token
            .strip_prefix("test-token:")
            .ok_or_else(|| AuthError::InvalidToken("expected test-token:<user_id>".to_string()))?;

        let user_id: UserId = rest.parse().map_err(|_| AuthError::InvalidUserId)?;

        Ok(ValidatedClaims {
            user_id,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}
