//! Domain types stored in the database.
//!
//! These types represent the persisted state of rooms, messages, the random-chat
//! queue and pairings, and commute preferences and groups.

use campus_core::{
    Direction, GroupId, MessageId, MinuteOfDay, PairingId, PreferenceId, RoomId, UserId,
};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A chat room in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier for the room.
    pub room_id: RoomId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Who may join the room.
    pub kind: RoomKind,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a room; the store assigns the identifier.
#[derive(Debug, Clone)]
pub struct NewRoom {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Who may join the room.
    pub kind: RoomKind,
}

/// Access classification of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomKind {
    /// Any authenticated user may join.
    Open,
    /// Only users holding `attribute` may join (e.g. a course key `subject|professor`).
    Restricted {
        /// The attribute a user must hold.
        attribute: String,
    },
}

/// The conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Channel {
    /// A broadcast room.
    Room(RoomId),
    /// A one-to-one random-chat pairing.
    Pairing(PairingId),
    /// A commute group.
    Group(GroupId),
}

impl Channel {
    /// Key tag distinguishing the channel spaces.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Room(_) => 1,
            Self::Pairing(_) => 2,
            Self::Group(_) => 3,
        }
    }

    /// Raw numeric identifier of the channel.
    #[must_use]
    pub const fn raw_id(self) -> u64 {
        match self {
            Self::Room(id) => id.get(),
            Self::Pairing(id) => id.get(),
            Self::Group(id) => id.get(),
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique identifier, increasing in commit order.
    pub message_id: MessageId,
    /// Conversation the message was posted to.
    pub channel: Channel,
    /// Author.
    pub user_id: UserId,
    /// Message text, exactly as received.
    pub body: String,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

/// A user waiting for a random-chat partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    /// The waiting user.
    pub user_id: UserId,
    /// Queue position; lower values were enqueued earlier.
    pub position: u64,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of [`crate::MatchStore::queue_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueInsert {
    /// A new entry was created.
    Inserted(WaitingEntry),
    /// The user was already waiting; the existing entry is returned.
    AlreadyQueued(WaitingEntry),
}

impl QueueInsert {
    /// The entry the user now holds, new or existing.
    #[must_use]
    pub const fn entry(&self) -> &WaitingEntry {
        match self {
            Self::Inserted(entry) | Self::AlreadyQueued(entry) => entry,
        }
    }
}

/// Two users matched for an anonymous one-to-one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomPairing {
    /// Unique identifier; clients see it as the chat `room_id`.
    pub pairing_id: PairingId,
    /// The user who was waiting.
    pub user_a: UserId,
    /// The user who found them.
    pub user_b: UserId,
    /// Whether the chat is still open.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the chat was closed (if closed).
    pub ended_at: Option<DateTime<Utc>>,
}

impl RandomPairing {
    /// Whether `user` is one of the two members.
    #[must_use]
    pub fn includes(&self, user: UserId) -> bool {
        self.user_a == user || self.user_b == user
    }

    /// The other member, or `None` if `user` is not a member.
    #[must_use]
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if self.user_a == user {
            Some(self.user_b)
        } else if self.user_b == user {
            Some(self.user_a)
        } else {
            None
        }
    }
}

/// A user's declared commute leg for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommutePreference {
    /// Unique identifier.
    pub preference_id: PreferenceId,
    /// Owner.
    pub user_id: UserId,
    /// Weekday the preference applies to.
    pub day: Weekday,
    /// Arrival or departure.
    pub direction: Direction,
    /// Target time.
    pub time: MinuteOfDay,
    /// Meeting point; empty when unspecified.
    pub location: String,
    /// Only active preferences participate in matching.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for one commute preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommutePreference {
    /// Weekday the preference applies to.
    pub day: Weekday,
    /// Arrival or departure.
    pub direction: Direction,
    /// Target time.
    pub time: MinuteOfDay,
    /// Meeting point; empty when unspecified.
    #[serde(default)]
    pub location: String,
}

/// A batch-computed commute group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommuteGroup {
    /// Unique identifier.
    pub group_id: GroupId,
    /// Calendar date the group was matched for.
    pub match_date: NaiveDate,
    /// Weekday of `match_date`.
    pub day: Weekday,
    /// Arrival or departure.
    pub direction: Direction,
    /// Meeting point.
    pub location: String,
    /// Representative time: floor average of the founding members' times.
    pub time_slot: MinuteOfDay,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a commute group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommuteGroup {
    /// Calendar date the group is matched for.
    pub match_date: NaiveDate,
    /// Arrival or departure.
    pub direction: Direction,
    /// Meeting point.
    pub location: String,
    /// Representative time.
    pub time_slot: MinuteOfDay,
}

/// A member row of a commute group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// The group.
    pub group_id: GroupId,
    /// The member.
    pub user_id: UserId,
    /// When the member was added.
    pub joined_at: DateTime<Utc>,
}

/// Outcome of [`crate::CommuteStore::group_member_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAdd {
    /// The user was added to the group.
    Added,
    /// The user already belongs to a group for the same date, direction and location.
    AlreadyGrouped(GroupId),
}
