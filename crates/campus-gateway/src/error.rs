//! API error types and responses.
//!
//! HTTP failures are JSON bodies of the form `{"error": {"code", "message"}}`.
//! WebSocket handshakes that fail after the upgrade close with a [`CloseReason`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use campus_auth::AuthError;
use campus_commute::CommuteError;
use campus_core::CoreError;
use campus_realtime::RealtimeError;
use campus_store::StoreError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication token.
    #[error("unauthorized")]
    Unauthorized,

    /// User does not have permission to access this resource.
    #[error("forbidden")]
    Forbidden,

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidSignature
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::InvalidUserId
            | AuthError::InvalidToken(_) => Self::Unauthorized,
            AuthError::Misconfigured(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("resource".to_string()),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => {
                tracing::error!(error = %other, "Store error");
                Self::Internal("storage error".to_string())
            }
        }
    }
}

impl From<RealtimeError> for ApiError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::RoomNotFound(id) => Self::NotFound(format!("room {id}")),
            RealtimeError::PairingNotFound(id) => Self::NotFound(format!("chat {id}")),
            RealtimeError::AccessDenied { .. } => Self::Forbidden,
            RealtimeError::NotPaired(_) => Self::Conflict("no active chat partner".to_string()),
            RealtimeError::Store(store_err) => Self::from(store_err),
            RealtimeError::Encode(e) => {
                tracing::error!(error = %e, "Failed to encode event");
                Self::Internal("encoding error".to_string())
            }
        }
    }
}

impl From<CommuteError> for ApiError {
    fn from(err: CommuteError) -> Self {
        match err {
            CommuteError::GroupNotFound(id) => Self::NotFound(format!("group {id}")),
            CommuteError::Config(msg) => Self::BadRequest(msg),
            CommuteError::Store(store_err) => Self::from(store_err),
        }
    }
}

/// Why a WebSocket was closed right after the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Missing, malformed or expired token.
    InvalidToken,
    /// The user may not join the room.
    AccessDenied,
    /// The room does not exist.
    RoomNotFound,
    /// The server failed to set up the session.
    Internal,
}

impl CloseReason {
    /// WebSocket close code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::InvalidToken => 4001,
            Self::AccessDenied => 4003,
            Self::RoomNotFound => 4004,
            Self::Internal => 1011,
        }
    }

    /// Human-readable close reason.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::InvalidToken => "Invalid or missing token",
            Self::AccessDenied => "Access denied",
            Self::RoomNotFound => "Room not found",
            Self::Internal => "Internal error",
        }
    }
}

impl From<&RealtimeError> for CloseReason {
    fn from(err: &RealtimeError) -> Self {
        match err {
            RealtimeError::RoomNotFound(_) => Self::RoomNotFound,
            RealtimeError::AccessDenied { .. } => Self::AccessDenied,
            _ => Self::Internal,
        }
    }
}
