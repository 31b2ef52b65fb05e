//! HTTP and WebSocket request handlers.

pub mod commute;
pub mod health;
pub mod random;
pub mod rooms;
pub mod ws;

use std::str::FromStr;

use campus_core::CoreError;
use serde::Deserialize;

use crate::error::ApiError;

/// Paging parameters of a history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of messages, newest last.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parse a path identifier.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Into<CoreError>,
{
    raw.parse::<T>().map_err(|e| ApiError::from(e.into()))
}
