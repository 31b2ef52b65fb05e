//! `RocksDB` storage layer for the campus realtime services.
//!
//! This crate provides persistent storage for rooms, chat history, the random-chat
//! queue and pairings, and commute preferences and groups, using `RocksDB` with
//! column families for indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `rooms`, `user_attributes`: Room catalog and access attribute grants
//! - `messages`: Chat history, keyed by channel then message id
//! - `queue`, `queue_by_user`: FIFO waiting queue for random chat
//! - `pairings`, `active_pairing_by_user`: Pairings plus the one-active-pairing-per-user index
//! - `preferences`, `preferences_by_user`, `active_preferences_by_day`: Commute preferences
//! - `groups`, `group_members`, `group_membership_unique`, `groups_by_user`: Commute groups
//!
//! Operations that must observe and update several records at once (pairing creation,
//! membership insertion, id allocation) run under a single writer lock and commit with
//! one `WriteBatch`.
//!
//! # Example
//!
//! ```no_run
//! use campus_core::{RoomId, UserId};
//! use campus_store::{Channel, MessageStore, RocksStore};
//!
//! let store = RocksStore::open("/tmp/campus-db").unwrap();
//!
//! let saved = store
//!     .save_message(Channel::Room(RoomId::new(1)), UserId::new(42), "hello")
//!     .unwrap();
//! let history = store.list_messages(saved.channel, 50).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    Channel, CommuteGroup, CommutePreference, GroupMember, MemberAdd, NewCommuteGroup,
    NewCommutePreference, NewRoom, QueueInsert, RandomPairing, Room, RoomKind, StoredMessage,
    WaitingEntry,
};

use campus_core::{Direction, GroupId, PairingId, RoomId, UserId};
use chrono::{NaiveDate, Weekday};

/// Room catalog and access attributes.
pub trait RoomStore: Send + Sync {
    /// Create a room, assigning it a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_room(&self, room: NewRoom) -> Result<Room>;

    /// Get a room by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_room(&self, room_id: RoomId) -> Result<Option<Room>>;

    /// List all rooms in identifier order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_rooms(&self) -> Result<Vec<Room>>;

    /// Grant an access attribute to a user. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn grant_attribute(&self, user_id: UserId, attribute: &str) -> Result<()>;

    /// Whether a user holds an access attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_attribute(&self, user_id: UserId, attribute: &str) -> Result<bool>;
}

/// Chat history for rooms and pairings.
pub trait MessageStore: Send + Sync {
    /// Persist a message, assigning its identifier and timestamp.
    ///
    /// Identifiers increase in commit order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn save_message(&self, channel: Channel, user_id: UserId, body: &str) -> Result<StoredMessage>;

    /// The most recent `limit` messages of a channel, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_messages(&self, channel: Channel, limit: usize) -> Result<Vec<StoredMessage>>;
}

/// Random-chat waiting queue and pairings.
///
/// The store enforces two invariants: a user holds at most one waiting entry, and a
/// user is a member of at most one active pairing. A user with an active pairing
/// never holds a waiting entry.
pub trait MatchStore: Send + Sync {
    /// Get a user's waiting entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn queue_get(&self, user_id: UserId) -> Result<Option<WaitingEntry>>;

    /// Enqueue a user at the back of the waiting queue.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the user has an active pairing.
    fn queue_insert(&self, user_id: UserId) -> Result<QueueInsert>;

    /// Remove a user's waiting entry. Returns whether an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn queue_delete(&self, user_id: UserId) -> Result<bool>;

    /// The oldest waiting entry that does not belong to `excluding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn queue_lookup_oldest(&self, excluding: UserId) -> Result<Option<WaitingEntry>>;

    /// Pair a waiting `candidate` with `user` in one transaction.
    ///
    /// Deletes both users' waiting entries and records the pairing as active for both.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the candidate is no longer waiting, if either
    /// user already has an active pairing, or if both are the same user.
    fn pairing_create(&self, candidate: UserId, user_id: UserId) -> Result<RandomPairing>;

    /// The active pairing of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn pairing_find_active(&self, user_id: UserId) -> Result<Option<RandomPairing>>;

    /// Get a pairing by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn pairing_get(&self, pairing_id: PairingId) -> Result<Option<RandomPairing>>;

    /// Flag a pairing inactive, keeping it and its history.
    ///
    /// Returns the updated pairing, or `None` if it was already inactive.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the pairing doesn't exist.
    fn pairing_deactivate(&self, pairing_id: PairingId) -> Result<Option<RandomPairing>>;
}

/// Commute preferences and groups.
pub trait CommuteStore: Send + Sync {
    /// Replace a user's preferences: deactivate every existing one and insert `new` as active.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn replace_preferences(
        &self,
        user_id: UserId,
        new: &[NewCommutePreference],
    ) -> Result<Vec<CommutePreference>>;

    /// Active preferences of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn preferences_for_user(&self, user_id: UserId) -> Result<Vec<CommutePreference>>;

    /// Active preferences for a weekday and direction, optionally restricted to a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn schedules_for_day(
        &self,
        day: Weekday,
        direction: Direction,
        location: Option<&str>,
    ) -> Result<Vec<CommutePreference>>;

    /// The group a user already belongs to for a date, direction and location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn group_find_existing(
        &self,
        match_date: NaiveDate,
        direction: Direction,
        location: &str,
        user_id: UserId,
    ) -> Result<Option<CommuteGroup>>;

    /// Create an empty group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn group_create(&self, group: NewCommuteGroup) -> Result<CommuteGroup>;

    /// Add a member to a group.
    ///
    /// Idempotent: if the user already belongs to this group, or to any other group for
    /// the same date, direction and location, nothing is written and
    /// `MemberAdd::AlreadyGrouped` names that group.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the group doesn't exist.
    fn group_member_add(&self, group_id: GroupId, user_id: UserId) -> Result<MemberAdd>;

    /// Get a group by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn group_get(&self, group_id: GroupId) -> Result<Option<CommuteGroup>>;

    /// Members of a group, in user ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn group_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>>;

    /// Groups a user belongs to on a date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn groups_for_user_on(&self, user_id: UserId, match_date: NaiveDate)
        -> Result<Vec<CommuteGroup>>;
}

/// The full persistence interface.
///
/// Components depend on the narrowest trait they need; services that own every
/// component hold a `Store`.
pub trait Store: RoomStore + MessageStore + MatchStore + CommuteStore {}

impl<T> Store for T where T: RoomStore + MessageStore + MatchStore + CommuteStore {}
