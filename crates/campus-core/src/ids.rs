//! Core identifier types for campus services.
//!
//! Durable records (users, rooms, messages, pairings, groups, preferences) are keyed by
//! numeric identifiers allocated by the store. Live connections are keyed by a random
//! [`ConnectionId`] that is never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create an identifier from its raw numeric value.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the raw numeric value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Big-endian encoding, so byte order matches numeric order in sorted key spaces.
            #[must_use]
            pub const fn to_be_bytes(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            /// Decode an identifier from the first eight bytes of `bytes`.
            ///
            /// # Errors
            ///
            /// Returns an error if fewer than eight bytes are available.
            pub fn from_be_slice(bytes: &[u8]) -> Result<Self, IdError> {
                let arr: [u8; 8] = bytes
                    .get(..8)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(IdError::InvalidLength {
                        expected: 8,
                        got: bytes.len(),
                    })?;
                Ok(Self(u64::from_be_bytes(arr)))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| IdError::InvalidNumber(s.to_string()))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// A user identifier, taken from the `sub` claim of a verified token.
    UserId
);

numeric_id!(
    /// A chat room identifier.
    RoomId
);

numeric_id!(
    /// A persisted chat message identifier (room and random-chat messages share one sequence).
    MessageId
);

numeric_id!(
    /// A random-chat pairing identifier.
    ///
    /// Clients see this as the `room_id` of their anonymous one-to-one chat.
    PairingId
);

numeric_id!(
    /// A commute group identifier.
    GroupId
);

numeric_id!(
    /// A commute preference identifier.
    PreferenceId
);

/// A 16-byte connection identifier based on UUID v4.
///
/// Connection IDs are generated for every accepted session and only live in memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Generate a new random `ConnectionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for ConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a non-negative integer.
    #[error("invalid numeric identifier: {0}")]
    InvalidNumber(String),

    /// The input has an incorrect length.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// The expected number of bytes.
        expected: usize,
        /// The actual number of bytes.
        got: usize,
    },

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_parse() {
        assert_eq!(UserId::from_str("42").unwrap(), UserId::new(42));
        assert_eq!(RoomId::from_str(" 7 ").unwrap().get(), 7);
        assert!(matches!(
            PairingId::from_str("abc"),
            Err(IdError::InvalidNumber(_))
        ));
        assert!(UserId::from_str("-1").is_err());
    }

    #[test]
    fn numeric_id_key_order_matches_numeric_order() {
        let a = MessageId::new(9).to_be_bytes();
        let b = MessageId::new(256).to_be_bytes();
        assert!(a < b);
        assert_eq!(MessageId::from_be_slice(&b).unwrap(), MessageId::new(256));
    }

    #[test]
    fn numeric_id_short_slice() {
        let result = GroupId::from_be_slice(&[1, 2, 3]);
        assert!(matches!(
            result,
            Err(IdError::InvalidLength {
                expected: 8,
                got: 3
            })
        ));
    }

    #[test]
    fn numeric_id_serializes_as_number() {
        let json = serde_json::to_string(&PairingId::new(15)).unwrap();
        assert_eq!(json, "15");
        let parsed: UserId = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, UserId::new(3));
    }

    #[test]
    fn connection_id_roundtrip() {
        let id = ConnectionId::generate();
        let parsed = ConnectionId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_ne!(id, ConnectionId::generate());
    }

    #[test]
    fn connection_id_invalid_uuid() {
        let result = ConnectionId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }
}
