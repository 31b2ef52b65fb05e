//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Sequence counters, keyed by sequence name.
    pub const META: &str = "meta";

    /// Room catalog, keyed by `room_id`.
    pub const ROOMS: &str = "rooms";

    /// Attribute grants, keyed by `user_id || attribute`.
    pub const USER_ATTRIBUTES: &str = "user_attributes";

    /// Chat messages, keyed by `channel || message_id`.
    pub const MESSAGES: &str = "messages";

    /// Random-chat waiting queue, keyed by `enqueue_seq || user_id` (FIFO order).
    pub const QUEUE: &str = "queue";

    /// Index: queue position by user, keyed by `user_id`.
    pub const QUEUE_BY_USER: &str = "queue_by_user";

    /// Random-chat pairings, keyed by `pairing_id`.
    pub const PAIRINGS: &str = "pairings";

    /// Unique index: the active pairing of a user, keyed by `user_id`.
    pub const ACTIVE_PAIRING_BY_USER: &str = "active_pairing_by_user";

    /// Commute preferences, keyed by `preference_id`.
    pub const PREFERENCES: &str = "preferences";

    /// Index: preferences by user, keyed by `user_id || preference_id`.
    pub const PREFERENCES_BY_USER: &str = "preferences_by_user";

    /// Index: active preferences by day, keyed by `weekday || direction || preference_id`.
    pub const ACTIVE_PREFERENCES_BY_DAY: &str = "active_preferences_by_day";

    /// Commute groups, keyed by `group_id`.
    pub const GROUPS: &str = "groups";

    /// Group members, keyed by `group_id || user_id`.
    pub const GROUP_MEMBERS: &str = "group_members";

    /// Unique index: one group per `match_date || direction || user_id || location`.
    pub const GROUP_MEMBERSHIP_UNIQUE: &str = "group_membership_unique";

    /// Index: groups by user, keyed by `user_id || match_date || group_id`.
    pub const GROUPS_BY_USER: &str = "groups_by_user";
}

/// Sequence names stored in [`cf::META`].
pub mod seq {
    /// Room identifiers.
    pub const ROOM: &str = "seq:room";
    /// Message identifiers (shared by room and pairing channels).
    pub const MESSAGE: &str = "seq:message";
    /// Waiting-queue positions.
    pub const QUEUE: &str = "seq:queue";
    /// Pairing identifiers.
    pub const PAIRING: &str = "seq:pairing";
    /// Preference identifiers.
    pub const PREFERENCE: &str = "seq:preference";
    /// Group identifiers.
    pub const GROUP: &str = "seq:group";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::META,
        cf::ROOMS,
        cf::USER_ATTRIBUTES,
        cf::MESSAGES,
        cf::QUEUE,
        cf::QUEUE_BY_USER,
        cf::PAIRINGS,
        cf::ACTIVE_PAIRING_BY_USER,
        cf::PREFERENCES,
        cf::PREFERENCES_BY_USER,
        cf::ACTIVE_PREFERENCES_BY_DAY,
        cf::GROUPS,
        cf::GROUP_MEMBERS,
        cf::GROUP_MEMBERSHIP_UNIQUE,
        cf::GROUPS_BY_USER,
    ]
}
