//! Token validation errors.

use thiserror::Error;

/// Result alias for token validation.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why a bearer token was rejected.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither the header nor the query carried a token.
    #[error("no bearer token supplied")]
    MissingToken,

    /// `exp` is in the past, beyond the configured leeway.
    #[error("token has expired")]
    TokenExpired,

    /// The HS256 signature does not match the shared secret.
    #[error("token signature mismatch")]
    InvalidSignature,

    /// `iss` differs from the configured issuer.
    #[error("unexpected token issuer")]
    InvalidIssuer,

    /// `aud` differs from the configured audience.
    #[error("unexpected token audience")]
    InvalidAudience,

    /// `sub` is not a numeric user id.
    #[error("token subject is not a user id")]
    InvalidUserId,

    /// The token could not be decoded at all.
    #[error("malformed token: {0}")]
    InvalidToken(String),

    /// The validator was built with an unusable configuration.
    #[error("auth misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Only an expired token is worth refreshing and retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// HTTP status for this rejection.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        if matches!(self, Self::Misconfigured(_)) {
            500
        } else {
            401
        }
    }
}
