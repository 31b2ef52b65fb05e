//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the store traits.

use std::path::Path;
use std::sync::Arc;

use campus_core::{Direction, GroupId, PairingId, PreferenceId, RoomId, UserId};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, seq};
use crate::types::{
    Channel, CommuteGroup, CommutePreference, GroupMember, MemberAdd, NewCommuteGroup,
    NewCommutePreference, NewRoom, QueueInsert, RandomPairing, Room, StoredMessage, WaitingEntry,
};
use crate::{CommuteStore, MatchStore, MessageStore, RoomStore};

type KeyValue = (Box<[u8]>, Box<[u8]>);

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes read-check-write sequences so uniqueness checks and id allocation
    /// observe every committed batch.
    write_lock: Mutex<()>,
}

fn db_err(e: rocksdb::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read and decode a single record.
    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_cf(&cf, key).map_err(db_err)?.is_some())
    }

    /// Collect every entry whose key starts with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<KeyValue>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(db_err)?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Current value of a sequence. Callers hold `write_lock`.
    fn read_seq(&self, name: &str) -> Result<u64> {
        let cf = self.cf(cf::META)?;
        match self.db.get_cf(&cf, name.as_bytes()).map_err(db_err)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::CorruptKey(format!("sequence {name} has {} bytes", bytes.len()))
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn put_seq(&self, batch: &mut WriteBatch, name: &str, value: u64) -> Result<()> {
        let cf = self.cf(cf::META)?;
        batch.put_cf(&cf, name.as_bytes(), value.to_be_bytes());
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch).map_err(db_err)
    }

    fn active_pairing_id(&self, user_id: UserId) -> Result<Option<PairingId>> {
        let cf = self.cf(cf::ACTIVE_PAIRING_BY_USER)?;
        self.db
            .get_cf(&cf, keys::user_key(user_id))
            .map_err(db_err)?
            .map(|bytes| PairingId::from_be_slice(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn get_preference(&self, preference_id: PreferenceId) -> Result<Option<CommutePreference>> {
        self.get(cf::PREFERENCES, &keys::preference_key(preference_id))
    }
}

impl RoomStore for RocksStore {
    fn create_room(&self, room: NewRoom) -> Result<Room> {
        let cf_rooms = self.cf(cf::ROOMS)?;
        let _guard = self.write_lock.lock();

        let room_id = RoomId::new(self.read_seq(seq::ROOM)? + 1);
        let room = Room {
            room_id,
            name: room.name,
            description: room.description,
            kind: room.kind,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_rooms, keys::room_key(room_id), Self::serialize(&room)?);
        self.put_seq(&mut batch, seq::ROOM, room_id.get())?;
        self.write(batch)?;

        tracing::debug!(room_id = %room_id, name = %room.name, "Room created");
        Ok(room)
    }

    fn get_room(&self, room_id: RoomId) -> Result<Option<Room>> {
        self.get(cf::ROOMS, &keys::room_key(room_id))
    }

    fn list_rooms(&self) -> Result<Vec<Room>> {
        self.scan_prefix(cf::ROOMS, &[])?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn grant_attribute(&self, user_id: UserId, attribute: &str) -> Result<()> {
        let cf = self.cf(cf::USER_ATTRIBUTES)?;
        self.db
            .put_cf(&cf, keys::attribute_key(user_id, attribute), [])
            .map_err(db_err)
    }

    fn has_attribute(&self, user_id: UserId, attribute: &str) -> Result<bool> {
        self.exists(cf::USER_ATTRIBUTES, &keys::attribute_key(user_id, attribute))
    }
}

impl MessageStore for RocksStore {
    fn save_message(&self, channel: Channel, user_id: UserId, body: &str) -> Result<StoredMessage> {
        let cf_messages = self.cf(cf::MESSAGES)?;
        let _guard = self.write_lock.lock();

        let message_id = campus_core::MessageId::new(self.read_seq(seq::MESSAGE)? + 1);
        let message = StoredMessage {
            message_id,
            channel,
            user_id,
            body: body.to_string(),
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_messages,
            keys::message_key(channel, message_id),
            Self::serialize(&message)?,
        );
        self.put_seq(&mut batch, seq::MESSAGE, message_id.get())?;
        self.write(batch)?;

        Ok(message)
    }

    fn list_messages(&self, channel: Channel, limit: usize) -> Result<Vec<StoredMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let cf = self.cf(cf::MESSAGES)?;
        let prefix = keys::channel_prefix(channel);
        let upper = keys::channel_upper_bound(channel);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, rocksdb::Direction::Reverse));

        let mut messages = Vec::with_capacity(limit);
        for item in iter {
            let (key, value) = item.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            messages.push(Self::deserialize(&value)?);
            if messages.len() == limit {
                break;
            }
        }

        messages.reverse();
        Ok(messages)
    }
}

impl MatchStore for RocksStore {
    fn queue_get(&self, user_id: UserId) -> Result<Option<WaitingEntry>> {
        self.get(cf::QUEUE_BY_USER, &keys::user_key(user_id))
    }

    fn queue_insert(&self, user_id: UserId) -> Result<QueueInsert> {
        let cf_queue = self.cf(cf::QUEUE)?;
        let cf_by_user = self.cf(cf::QUEUE_BY_USER)?;
        let _guard = self.write_lock.lock();

        if self.active_pairing_id(user_id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already has an active pairing"
            )));
        }
        if let Some(existing) = self.queue_get(user_id)? {
            return Ok(QueueInsert::AlreadyQueued(existing));
        }

        let entry = WaitingEntry {
            user_id,
            position: self.read_seq(seq::QUEUE)? + 1,
            enqueued_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_queue, keys::queue_key(entry.position, user_id), []);
        batch.put_cf(&cf_by_user, keys::user_key(user_id), Self::serialize(&entry)?);
        self.put_seq(&mut batch, seq::QUEUE, entry.position)?;
        self.write(batch)?;

        Ok(QueueInsert::Inserted(entry))
    }

    fn queue_delete(&self, user_id: UserId) -> Result<bool> {
        let cf_queue = self.cf(cf::QUEUE)?;
        let cf_by_user = self.cf(cf::QUEUE_BY_USER)?;
        let _guard = self.write_lock.lock();

        let Some(entry) = self.queue_get(user_id)? else {
            return Ok(false);
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_queue, keys::queue_key(entry.position, user_id));
        batch.delete_cf(&cf_by_user, keys::user_key(user_id));
        self.write(batch)?;

        Ok(true)
    }

    fn queue_lookup_oldest(&self, excluding: UserId) -> Result<Option<WaitingEntry>> {
        let cf = self.cf(cf::QUEUE)?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(db_err)?;
            let user_id = UserId::from_be_slice(key.get(8..).unwrap_or_default())?;
            if user_id == excluding {
                continue;
            }
            if let Some(entry) = self.queue_get(user_id)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn pairing_create(&self, candidate: UserId, user_id: UserId) -> Result<RandomPairing> {
        let cf_queue = self.cf(cf::QUEUE)?;
        let cf_by_user = self.cf(cf::QUEUE_BY_USER)?;
        let cf_pairings = self.cf(cf::PAIRINGS)?;
        let cf_active = self.cf(cf::ACTIVE_PAIRING_BY_USER)?;
        let _guard = self.write_lock.lock();

        if candidate == user_id {
            return Err(StoreError::Conflict("cannot pair a user with themselves".into()));
        }
        for member in [candidate, user_id] {
            if self.active_pairing_id(member)?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "user {member} already has an active pairing"
                )));
            }
        }
        let Some(candidate_entry) = self.queue_get(candidate)? else {
            return Err(StoreError::Conflict(format!(
                "user {candidate} is no longer waiting"
            )));
        };

        let pairing = RandomPairing {
            pairing_id: PairingId::new(self.read_seq(seq::PAIRING)? + 1),
            user_a: candidate,
            user_b: user_id,
            active: true,
            created_at: Utc::now(),
            ended_at: None,
        };
        let pairing_id_bytes = pairing.pairing_id.to_be_bytes();

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_pairings,
            keys::pairing_key(pairing.pairing_id),
            Self::serialize(&pairing)?,
        );
        batch.put_cf(&cf_active, keys::user_key(candidate), pairing_id_bytes);
        batch.put_cf(&cf_active, keys::user_key(user_id), pairing_id_bytes);

        batch.delete_cf(&cf_queue, keys::queue_key(candidate_entry.position, candidate));
        batch.delete_cf(&cf_by_user, keys::user_key(candidate));
        if let Some(own_entry) = self.queue_get(user_id)? {
            batch.delete_cf(&cf_queue, keys::queue_key(own_entry.position, user_id));
            batch.delete_cf(&cf_by_user, keys::user_key(user_id));
        }

        self.put_seq(&mut batch, seq::PAIRING, pairing.pairing_id.get())?;
        self.write(batch)?;

        Ok(pairing)
    }

    fn pairing_find_active(&self, user_id: UserId) -> Result<Option<RandomPairing>> {
        match self.active_pairing_id(user_id)? {
            Some(pairing_id) => self.pairing_get(pairing_id),
            None => Ok(None),
        }
    }

    fn pairing_get(&self, pairing_id: PairingId) -> Result<Option<RandomPairing>> {
        self.get(cf::PAIRINGS, &keys::pairing_key(pairing_id))
    }

    fn pairing_deactivate(&self, pairing_id: PairingId) -> Result<Option<RandomPairing>> {
        let cf_pairings = self.cf(cf::PAIRINGS)?;
        let cf_active = self.cf(cf::ACTIVE_PAIRING_BY_USER)?;
        let _guard = self.write_lock.lock();

        let mut pairing = self.pairing_get(pairing_id)?.ok_or(StoreError::NotFound)?;
        if !pairing.active {
            return Ok(None);
        }
        pairing.active = false;
        pairing.ended_at = Some(Utc::now());

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_pairings,
            keys::pairing_key(pairing_id),
            Self::serialize(&pairing)?,
        );
        for member in [pairing.user_a, pairing.user_b] {
            if self.active_pairing_id(member)? == Some(pairing_id) {
                batch.delete_cf(&cf_active, keys::user_key(member));
            }
        }
        self.write(batch)?;

        Ok(Some(pairing))
    }
}

impl CommuteStore for RocksStore {
    fn replace_preferences(
        &self,
        user_id: UserId,
        new: &[NewCommutePreference],
    ) -> Result<Vec<CommutePreference>> {
        let cf_prefs = self.cf(cf::PREFERENCES)?;
        let cf_by_user = self.cf(cf::PREFERENCES_BY_USER)?;
        let cf_by_day = self.cf(cf::ACTIVE_PREFERENCES_BY_DAY)?;
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();

        // Deactivate everything the user had
        for (key, _) in self.scan_prefix(cf::PREFERENCES_BY_USER, &keys::user_key(user_id))? {
            let preference_id = keys::extract_preference_id(&key)?;
            let Some(mut old) = self.get_preference(preference_id)? else {
                continue;
            };
            if old.active {
                old.active = false;
                batch.put_cf(
                    &cf_prefs,
                    keys::preference_key(preference_id),
                    Self::serialize(&old)?,
                );
                batch.delete_cf(
                    &cf_by_day,
                    keys::day_key(old.day, old.direction, preference_id),
                );
            }
        }

        let mut next_id = self.read_seq(seq::PREFERENCE)?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(new.len());
        for item in new {
            next_id += 1;
            let preference = CommutePreference {
                preference_id: PreferenceId::new(next_id),
                user_id,
                day: item.day,
                direction: item.direction,
                time: item.time,
                location: item.location.trim().to_string(),
                active: true,
                created_at: now,
            };
            let id = preference.preference_id;
            batch.put_cf(&cf_prefs, keys::preference_key(id), Self::serialize(&preference)?);
            batch.put_cf(&cf_by_user, keys::user_preference_key(user_id, id), []);
            batch.put_cf(
                &cf_by_day,
                keys::day_key(preference.day, preference.direction, id),
                [],
            );
            created.push(preference);
        }
        self.put_seq(&mut batch, seq::PREFERENCE, next_id)?;
        self.write(batch)?;

        tracing::debug!(user_id = %user_id, count = created.len(), "Commute preferences replaced");
        Ok(created)
    }

    fn preferences_for_user(&self, user_id: UserId) -> Result<Vec<CommutePreference>> {
        let mut preferences = Vec::new();
        for (key, _) in self.scan_prefix(cf::PREFERENCES_BY_USER, &keys::user_key(user_id))? {
            if let Some(preference) = self.get_preference(keys::extract_preference_id(&key)?)? {
                if preference.active {
                    preferences.push(preference);
                }
            }
        }
        Ok(preferences)
    }

    fn schedules_for_day(
        &self,
        day: Weekday,
        direction: Direction,
        location: Option<&str>,
    ) -> Result<Vec<CommutePreference>> {
        let mut preferences = Vec::new();
        for (key, _) in
            self.scan_prefix(cf::ACTIVE_PREFERENCES_BY_DAY, &keys::day_prefix(day, direction))?
        {
            let preference_id = keys::extract_preference_id_from_day_key(&key)?;
            let Some(preference) = self.get_preference(preference_id)? else {
                continue;
            };
            if !preference.active {
                continue;
            }
            if location.is_some_and(|loc| loc != preference.location) {
                continue;
            }
            preferences.push(preference);
        }
        Ok(preferences)
    }

    fn group_find_existing(
        &self,
        match_date: NaiveDate,
        direction: Direction,
        location: &str,
        user_id: UserId,
    ) -> Result<Option<CommuteGroup>> {
        let cf = self.cf(cf::GROUP_MEMBERSHIP_UNIQUE)?;
        let key = keys::membership_key(match_date, direction, user_id, location);
        match self.db.get_cf(&cf, key).map_err(db_err)? {
            Some(bytes) => self.group_get(GroupId::from_be_slice(&bytes)?),
            None => Ok(None),
        }
    }

    fn group_create(&self, group: NewCommuteGroup) -> Result<CommuteGroup> {
        let cf_groups = self.cf(cf::GROUPS)?;
        let _guard = self.write_lock.lock();

        let group = CommuteGroup {
            group_id: GroupId::new(self.read_seq(seq::GROUP)? + 1),
            match_date: group.match_date,
            day: group.match_date.weekday(),
            direction: group.direction,
            location: group.location,
            time_slot: group.time_slot,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_groups,
            keys::group_key(group.group_id),
            Self::serialize(&group)?,
        );
        self.put_seq(&mut batch, seq::GROUP, group.group_id.get())?;
        self.write(batch)?;

        Ok(group)
    }

    fn group_member_add(&self, group_id: GroupId, user_id: UserId) -> Result<MemberAdd> {
        let cf_members = self.cf(cf::GROUP_MEMBERS)?;
        let cf_unique = self.cf(cf::GROUP_MEMBERSHIP_UNIQUE)?;
        let cf_by_user = self.cf(cf::GROUPS_BY_USER)?;
        let _guard = self.write_lock.lock();

        let group = self.group_get(group_id)?.ok_or(StoreError::NotFound)?;
        let unique_key =
            keys::membership_key(group.match_date, group.direction, user_id, &group.location);
        if let Some(bytes) = self.db.get_cf(&cf_unique, &unique_key).map_err(db_err)? {
            return Ok(MemberAdd::AlreadyGrouped(GroupId::from_be_slice(&bytes)?));
        }

        let member = GroupMember {
            group_id,
            user_id,
            joined_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_members,
            keys::group_member_key(group_id, user_id),
            Self::serialize(&member)?,
        );
        batch.put_cf(&cf_unique, &unique_key, group_id.to_be_bytes());
        batch.put_cf(
            &cf_by_user,
            keys::user_group_key(user_id, group.match_date, group_id),
            [],
        );
        self.write(batch)?;

        Ok(MemberAdd::Added)
    }

    fn group_get(&self, group_id: GroupId) -> Result<Option<CommuteGroup>> {
        self.get(cf::GROUPS, &keys::group_key(group_id))
    }

    fn group_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>> {
        self.scan_prefix(cf::GROUP_MEMBERS, &keys::group_key(group_id))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn groups_for_user_on(
        &self,
        user_id: UserId,
        match_date: NaiveDate,
    ) -> Result<Vec<CommuteGroup>> {
        let mut groups = Vec::new();
        for (key, _) in
            self.scan_prefix(cf::GROUPS_BY_USER, &keys::user_date_prefix(user_id, match_date))?
        {
            let group_id = keys::extract_group_id_from_user_group_key(&key)?;
            if let Some(group) = self.group_get(group_id)? {
                groups.push(group);
            }
        }
        Ok(groups)
    }
}
