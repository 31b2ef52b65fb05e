//! Wire envelopes for room and random-chat sessions.
//!
//! Every frame is a JSON object with a `type` discriminator. Inbound frames that do
//! not parse are dropped by the caller without closing the session.

use campus_core::{MessageId, PairingId, UserId};
use campus_store::StoredMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender label shown to the partner in random chat.
pub const PEER_LABEL: &str = "peer";

/// Sender label on the echo of a user's own random-chat message.
pub const SELF_LABEL: &str = "me";

/// Anonymous display name for a room message author.
#[must_use]
pub fn anonymous_label(user_id: UserId) -> String {
    format!("Anonymous{}", user_id.get().wrapping_mul(7) % 1000)
}

/// Frames a client sends on a room session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomInbound {
    /// Post a message to the room.
    Message {
        /// Message text.
        #[serde(default)]
        message: String,
    },
}

/// Frames a client sends on a random-chat session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RandomInbound {
    /// Send a message to the partner.
    Message {
        /// The pairing, if the client knows it.
        #[serde(default)]
        room_id: Option<PairingId>,
        /// Message text.
        #[serde(default)]
        message: String,
    },
    /// Leave the current pairing and close the session.
    Disconnect,
}

/// Parse an inbound frame, returning `None` for anything malformed.
#[must_use]
pub fn parse_inbound<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(text).ok()
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A chat message.
    Message {
        /// Message identifier.
        id: MessageId,
        /// Author.
        user_id: UserId,
        /// Display label for the author.
        sender: String,
        /// Message text.
        message: String,
        /// Commit timestamp.
        created_at: DateTime<Utc>,
        /// Random and group chat only: whether the recipient wrote it.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_mine: Option<bool>,
    },
    /// Presence change in a room.
    System {
        /// Human-readable notice.
        message: String,
        /// Sessions now in the room.
        online_count: usize,
    },
    /// A random-chat partner was found.
    Matched {
        /// The pairing to address messages to.
        room_id: PairingId,
    },
    /// Waiting for a random-chat partner.
    Waiting,
    /// The random-chat partner left.
    PartnerLeft,
    /// A request on this session failed.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// A room broadcast of a stored message.
    #[must_use]
    pub fn room_message(message: &StoredMessage) -> Self {
        Self::Message {
            id: message.message_id,
            user_id: message.user_id,
            sender: anonymous_label(message.user_id),
            message: message.body.clone(),
            created_at: message.created_at,
            is_mine: None,
        }
    }

    /// A random-chat message as seen by `viewer`.
    #[must_use]
    pub fn pairing_message(message: &StoredMessage, viewer: UserId) -> Self {
        let is_mine = message.user_id == viewer;
        Self::Message {
            id: message.message_id,
            user_id: message.user_id,
            sender: if is_mine { SELF_LABEL } else { PEER_LABEL }.to_string(),
            message: message.body.clone(),
            created_at: message.created_at,
            is_mine: Some(is_mine),
        }
    }

    /// A commute group message as seen by `viewer`. Other members stay anonymous.
    #[must_use]
    pub fn group_message(message: &StoredMessage, viewer: UserId) -> Self {
        let is_mine = message.user_id == viewer;
        Self::Message {
            id: message.message_id,
            user_id: message.user_id,
            sender: if is_mine {
                SELF_LABEL.to_string()
            } else {
                anonymous_label(message.user_id)
            },
            message: message.body.clone(),
            created_at: message.created_at,
            is_mine: Some(is_mine),
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
