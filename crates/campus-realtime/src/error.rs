//! Error types for room chat and random matching.

use campus_core::{PairingId, RoomId, UserId};
use thiserror::Error;

/// A result type using `RealtimeError`.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Errors that can occur in realtime chat operations.
///
/// Delivery failures are not errors: they are reported as
/// [`Delivery::Failed`](crate::Delivery::Failed) and heal by pruning the session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The requested room was not found.
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    /// The user may not join the room.
    #[error("user {user_id} may not access room {room_id}")]
    AccessDenied {
        /// The user making the request.
        user_id: UserId,
        /// The room being accessed.
        room_id: RoomId,
    },

    /// The pairing does not exist or the user is not one of its members.
    #[error("pairing not found: {0}")]
    PairingNotFound(PairingId),

    /// The user sent a message without an active pairing.
    #[error("user {0} is not in an active pairing")]
    NotPaired(UserId),

    /// An outbound envelope could not be encoded.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] campus_store::StoreError),
}

impl RealtimeError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::RoomNotFound(_) | Self::PairingNotFound(_) => 404,
            Self::AccessDenied { .. } => 403,
            Self::NotPaired(_) => 409,
            Self::Encode(_) | Self::Store(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let user_id = UserId::new(1);
        let room_id = RoomId::new(2);

        assert_eq!(RealtimeError::RoomNotFound(room_id).http_status_code(), 404);
        assert_eq!(
            RealtimeError::AccessDenied { user_id, room_id }.http_status_code(),
            403
        );
        assert_eq!(
            RealtimeError::PairingNotFound(PairingId::new(3)).http_status_code(),
            404
        );
        assert_eq!(RealtimeError::NotPaired(user_id).http_status_code(), 409);
        assert_eq!(
            RealtimeError::Store(campus_store::StoreError::NotFound).http_status_code(),
            500
        );
        assert!(RealtimeError::Store(campus_store::StoreError::NotFound).is_retriable());
        assert!(!RealtimeError::NotPaired(user_id).is_retriable());
    }
}
