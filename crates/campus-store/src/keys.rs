//! Key encoding utilities for `RocksDB`.
//!
//! Numeric identifiers are encoded big-endian so that lexicographic key order matches
//! numeric order. Composite keys place the scan dimension first so that related
//! records can be read with a prefix scan.

use campus_core::{Direction, GroupId, MessageId, PairingId, PreferenceId, RoomId, UserId};
use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::Result;
use crate::types::Channel;

const ID_LEN: usize = 8;
const DATE_LEN: usize = 8;

/// Encode a room key.
#[must_use]
pub fn room_key(room_id: RoomId) -> Vec<u8> {
    room_id.to_be_bytes().to_vec()
}

/// Encode a user key (used by every per-user index).
#[must_use]
pub fn user_key(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Encode an attribute grant key: `user_id || attribute`.
#[must_use]
pub fn attribute_key(user_id: UserId, attribute: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN + attribute.len());
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(attribute.as_bytes());
    key
}

/// Encode a channel prefix: `tag || channel_id`.
#[must_use]
pub fn channel_prefix(channel: Channel) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 2 * ID_LEN);
    key.push(channel.tag());
    key.extend_from_slice(&channel.raw_id().to_be_bytes());
    key
}

/// Encode a message key: `tag || channel_id || message_id`.
#[must_use]
pub fn message_key(channel: Channel, message_id: MessageId) -> Vec<u8> {
    let mut key = channel_prefix(channel);
    key.extend_from_slice(&message_id.to_be_bytes());
    key
}

/// The greatest possible message key of a channel, for reverse scans.
#[must_use]
pub fn channel_upper_bound(channel: Channel) -> Vec<u8> {
    message_key(channel, MessageId::new(u64::MAX))
}

/// Encode a queue key: `position || user_id`.
#[must_use]
pub fn queue_key(position: u64, user_id: UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN);
    key.extend_from_slice(&position.to_be_bytes());
    key.extend_from_slice(&user_id.to_be_bytes());
    key
}

/// Encode a pairing key.
#[must_use]
pub fn pairing_key(pairing_id: PairingId) -> Vec<u8> {
    pairing_id.to_be_bytes().to_vec()
}

/// Encode a preference key.
#[must_use]
pub fn preference_key(preference_id: PreferenceId) -> Vec<u8> {
    preference_id.to_be_bytes().to_vec()
}

/// Encode a user-preference index key: `user_id || preference_id`.
#[must_use]
pub fn user_preference_key(user_id: UserId, preference_id: PreferenceId) -> Vec<u8> {
    let mut key = user_key(user_id);
    key.extend_from_slice(&preference_id.to_be_bytes());
    key
}

/// Extract the preference ID from a user-preference key.
///
/// # Errors
///
/// Returns an error if the key is too short.
pub fn extract_preference_id(key: &[u8]) -> Result<PreferenceId> {
    Ok(PreferenceId::from_be_slice(key.get(ID_LEN..).unwrap_or_default())?)
}

/// Encode a weekday as a single byte, Monday = 0.
#[must_use]
pub fn weekday_byte(day: Weekday) -> u8 {
    // num_days_from_monday() is at most 6.
    #[allow(clippy::cast_possible_truncation)]
    let byte = day.num_days_from_monday() as u8;
    byte
}

/// Encode a day index prefix: `weekday || direction`.
#[must_use]
pub fn day_prefix(day: Weekday, direction: Direction) -> Vec<u8> {
    vec![weekday_byte(day), direction.as_u8()]
}

/// Encode a day index key: `weekday || direction || preference_id`.
#[must_use]
pub fn day_key(day: Weekday, direction: Direction, preference_id: PreferenceId) -> Vec<u8> {
    let mut key = day_prefix(day, direction);
    key.extend_from_slice(&preference_id.to_be_bytes());
    key
}

/// Extract the preference ID from a day index key.
///
/// # Errors
///
/// Returns an error if the key is too short.
pub fn extract_preference_id_from_day_key(key: &[u8]) -> Result<PreferenceId> {
    Ok(PreferenceId::from_be_slice(key.get(2..).unwrap_or_default())?)
}

/// Encode a date as `YYYYMMDD`, which sorts chronologically.
#[must_use]
pub fn date_bytes(date: NaiveDate) -> Vec<u8> {
    format!(
        "{:04}{:02}{:02}",
        date.year().clamp(0, 9999),
        date.month(),
        date.day()
    )
    .into_bytes()
}

/// Encode a group key.
#[must_use]
pub fn group_key(group_id: GroupId) -> Vec<u8> {
    group_id.to_be_bytes().to_vec()
}

/// Encode a group member key: `group_id || user_id`.
#[must_use]
pub fn group_member_key(group_id: GroupId, user_id: UserId) -> Vec<u8> {
    let mut key = group_key(group_id);
    key.extend_from_slice(&user_id.to_be_bytes());
    key
}

/// Encode a membership uniqueness key: `match_date || direction || user_id || location`.
#[must_use]
pub fn membership_key(
    match_date: NaiveDate,
    direction: Direction,
    user_id: UserId,
    location: &str,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(DATE_LEN + 1 + ID_LEN + location.len());
    key.extend_from_slice(&date_bytes(match_date));
    key.push(direction.as_u8());
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(location.as_bytes());
    key
}

/// Encode a user-date prefix: `user_id || match_date`.
#[must_use]
pub fn user_date_prefix(user_id: UserId, match_date: NaiveDate) -> Vec<u8> {
    let mut key = user_key(user_id);
    key.extend_from_slice(&date_bytes(match_date));
    key
}

/// Encode a user-group index key: `user_id || match_date || group_id`.
#[must_use]
pub fn user_group_key(user_id: UserId, match_date: NaiveDate, group_id: GroupId) -> Vec<u8> {
    let mut key = user_date_prefix(user_id, match_date);
    key.extend_from_slice(&group_id.to_be_bytes());
    key
}

/// Extract the group ID from a user-group key.
///
/// # Errors
///
/// Returns an error if the key is too short.
pub fn extract_group_id_from_user_group_key(key: &[u8]) -> Result<GroupId> {
    Ok(GroupId::from_be_slice(
        key.get(ID_LEN + DATE_LEN..).unwrap_or_default(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_keys_sort_by_id_within_channel() {
        let room = Channel::Room(RoomId::new(3));
        let early = message_key(room, MessageId::new(9));
        let late = message_key(room, MessageId::new(300));
        assert!(early < late);
        assert!(late < channel_upper_bound(room));
        assert!(early.starts_with(&channel_prefix(room)));

        // Same numeric id in the other channel space never shares a prefix.
        let pairing = Channel::Pairing(PairingId::new(3));
        assert!(!message_key(pairing, MessageId::new(9)).starts_with(&channel_prefix(room)));
        let group = Channel::Group(GroupId::new(3));
        assert!(!message_key(group, MessageId::new(9)).starts_with(&channel_prefix(pairing)));
    }

    #[test]
    fn queue_keys_are_fifo() {
        let first = queue_key(1, UserId::new(500));
        let second = queue_key(2, UserId::new(1));
        assert!(first < second);
    }

    #[test]
    fn user_group_key_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let key = user_group_key(UserId::new(7), date, GroupId::new(42));
        assert!(key.starts_with(&user_date_prefix(UserId::new(7), date)));
        assert_eq!(
            extract_group_id_from_user_group_key(&key).unwrap(),
            GroupId::new(42)
        );
    }

    #[test]
    fn day_key_roundtrip() {
        let key = day_key(Weekday::Wed, Direction::Arrival, PreferenceId::new(11));
        assert!(key.starts_with(&day_prefix(Weekday::Wed, Direction::Arrival)));
        assert!(!key.starts_with(&day_prefix(Weekday::Wed, Direction::Departure)));
        assert_eq!(
            extract_preference_id_from_day_key(&key).unwrap(),
            PreferenceId::new(11)
        );
    }

    #[test]
    fn extract_rejects_short_keys() {
        assert!(extract_preference_id(&[1, 2, 3]).is_err());
    }

    #[test]
    fn date_bytes_sort_chronologically() {
        let a = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(date_bytes(a), b"20240930".to_vec());
        assert!(date_bytes(a) < date_bytes(b));
    }
}
