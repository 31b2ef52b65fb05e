//! JWT authentication for the campus realtime services.
//!
//! Tokens are issued elsewhere; this crate only verifies them. The `sub` claim carries
//! the numeric user id, and tokens are signed with a shared HS256 secret.
//!
//! # Example
//!
//! ```no_run
//! use campus_auth::{AuthConfig, Hs256Validator, JwtValidator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::new("change-me");
//! let validator = Hs256Validator::new(&config)?;
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...";
//! let claims = validator.validate(token).await?;
//!
//! println!("User ID: {}", claims.user_id);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod jwt;

pub use error::{AuthError, Result};
pub use jwt::{Hs256Validator, JwtValidator, ValidatedClaims};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::{mint_token, MockJwtValidator};

/// Configuration for token verification.
#[derive(Clone)]
pub struct AuthConfig {
    /// Shared HS256 signing secret.
    pub secret: String,
    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,
    /// Expected `aud` claim, if any.
    pub audience: Option<String>,
    /// Clock skew allowance for `exp`, in seconds.
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Configuration with only a secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: None,
            leeway_seconds: 30,
        }
    }

    /// Load from `JWT_SECRET`, `JWT_ISSUER`, `JWT_AUDIENCE` and `JWT_LEEWAY_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is unset or empty.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() {
            return Err(AuthError::Misconfigured("JWT_SECRET must be set".into()));
        }

        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Ok(Self {
            secret,
            issuer: non_empty("JWT_ISSUER"),
            audience: non_empty("JWT_AUDIENCE"),
            leeway_seconds: non_empty("JWT_LEEWAY_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_hides_secret() {
        let config = AuthConfig::new("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(config.leeway_seconds, 30);
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::MissingToken.http_status_code(), 401);
        assert_eq!(AuthError::TokenExpired.http_status_code(), 401);
        assert_eq!(AuthError::InvalidUserId.http_status_code(), 401);
        assert_eq!(
            AuthError::Misconfigured("test".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn auth_error_retriable() {
        assert!(AuthError::TokenExpired.is_retriable());
        assert!(!AuthError::InvalidSignature.is_retriable());
        assert!(!AuthError::MissingToken.is_retriable());
    }
}
