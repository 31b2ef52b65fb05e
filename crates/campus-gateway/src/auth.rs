//! Authentication extractors.
//!
//! HTTP requests carry `Authorization: Bearer <token>`. Browsers cannot set headers
//! on a WebSocket handshake, so sockets pass the token as `?token=` instead.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use campus_auth::{AuthError, JwtValidator, ValidatedClaims};
use campus_core::UserId;
use campus_store::Store;

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated user extracted from a JWT token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// The user ID from the token subject.
    pub user_id: UserId,
    /// When the token expires.
    pub expires_at: DateTime<Utc>,
}

impl From<ValidatedClaims> for AuthUser {
    fn from(claims: ValidatedClaims) -> Self {
        Self {
            user_id: claims.user_id,
            expires_at: claims.expires_at,
        }
    }
}

/// Token query parameter of a WebSocket handshake.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// The JWT.
    #[serde(default)]
    pub token: Option<String>,
}

/// Validate a WebSocket handshake token, taken from the query or, failing that,
/// the `Authorization` header.
///
/// # Errors
///
/// Returns `AuthError::MissingToken` if neither is present, or the validator's error.
pub async fn authenticate_socket<V: JwtValidator>(
    validator: &V,
    query: &TokenQuery,
    fallback: Option<&str>,
) -> Result<AuthUser, AuthError> {
    let token = query
        .token
        .as_deref()
        .or(fallback)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;
    Ok(validator.validate(token).await?.into())
}

/// Token from an `Authorization: Bearer` header value.
#[must_use]
pub fn header_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

#[async_trait]
impl<S, V> FromRequestParts<Arc<GatewayState<S, V>>> for AuthUser
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<S, V>>,
    ) -> Result<Self, Self::Rejection> {
        let token = header_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims = state.jwt_validator.validate(token).await?;
        Ok(Self::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_auth::MockJwtValidator;

    #[test]
    fn auth_user_from_claims() {
        let claims = ValidatedClaims {
            user_id: UserId::new(42),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let user = AuthUser::from(claims);
        assert_eq!(user.user_id, UserId::new(42));
        assert_eq!(user.expires_at, claims.expires_at);
    }

    #[tokio::test]
    async fn socket_token_prefers_query() {
        let query = TokenQuery {
            token: Some("test-token:5".into()),
        };
        let user = authenticate_socket(&MockJwtValidator, &query, Some("test-token:6"))
            .await
            .unwrap();
        assert_eq!(user.user_id, UserId::new(5));

        let user = authenticate_socket(&MockJwtValidator, &TokenQuery::default(), Some("test-token:6"))
            .await
            .unwrap();
        assert_eq!(user.user_id, UserId::new(6));
    }

    #[tokio::test]
    async fn socket_token_missing() {
        assert!(matches!(
            authenticate_socket(&MockJwtValidator, &TokenQuery::default(), None).await,
            Err(AuthError::MissingToken)
        ));
        let bad = TokenQuery {
            token: Some("garbage".into()),
        };
        assert!(authenticate_socket(&MockJwtValidator, &bad, None).await.is_err());
    }
}
