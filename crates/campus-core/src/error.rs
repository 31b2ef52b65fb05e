//! Common error types for campus services.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised while interpreting client-supplied domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An invalid time or commute direction was provided.
    #[error("invalid time: {0}")]
    InvalidTime(#[from] crate::time::TimeError),

    /// A required text field was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}
