//! Error types for commute matching.

use thiserror::Error;

/// Errors that can occur during commute matching.
#[derive(Error, Debug)]
pub enum CommuteError {
    /// The requested group was not found.
    #[error("group not found: {0}")]
    GroupNotFound(campus_core::GroupId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] campus_store::StoreError),
}

impl CommuteError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::GroupNotFound(_) => 404,
            Self::Config(_) => 400,
            Self::Store(_) => 503,
        }
    }
}

/// A specialized Result type for commute operations.
pub type Result<T> = std::result::Result<T, CommuteError>;
