//! Room chat: join, post, leave.
//!
//! Posting persists the message and broadcasts it while holding the room's sequencer,
//! so every recipient sees a room's messages in commit order. Different rooms never
//! contend on the same sequencer.

use std::collections::HashMap;
use std::sync::Arc;

use campus_core::{ConnectionId, RoomId, UserId};
use campus_store::{Channel, MessageStore, Room, RoomStore, StoredMessage};
use parking_lot::Mutex;

use crate::access::{RoomAccessPolicy, StoreAccessPolicy};
use crate::error::{RealtimeError, Result};
use crate::protocol::ServerEvent;
use crate::registry::{ConnectionRegistry, Registration};

const JOIN_NOTICE: &str = "A new user joined the room";
const LEAVE_NOTICE: &str = "A user left the room";

/// A joined room session.
#[derive(Debug)]
pub struct RoomSession {
    /// The room joined.
    pub room: Room,
    /// The registry handle for this connection.
    pub registration: Registration,
}

/// Room chat service.
pub struct RoomChat<S, P = StoreAccessPolicy<S>> {
    store: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    policy: P,
    sequencers: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl<S: RoomStore + MessageStore> RoomChat<S, StoreAccessPolicy<S>> {
    /// Create a room chat service using attribute grants from `store` for access.
    #[must_use]
    pub fn with_store_policy(store: Arc<S>, registry: Arc<ConnectionRegistry>) -> Self {
        let policy = StoreAccessPolicy::new(Arc::clone(&store));
        Self::new(store, registry, policy)
    }
}

impl<S, P> RoomChat<S, P>
where
    S: RoomStore + MessageStore,
    P: RoomAccessPolicy,
{
    /// Create a room chat service.
    #[must_use]
    pub fn new(store: Arc<S>, registry: Arc<ConnectionRegistry>, policy: P) -> Self {
        Self {
            store,
            registry,
            policy,
            sequencers: Mutex::new(HashMap::new()),
        }
    }

    fn sequencer(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        Arc::clone(self.sequencers.lock().entry(room_id).or_default())
    }

    /// Look up a room and check that `user_id` may join it.
    ///
    /// # Errors
    ///
    /// Returns `RoomNotFound` or `AccessDenied`.
    pub fn authorize(&self, room_id: RoomId, user_id: UserId) -> Result<Room> {
        let room = self
            .store
            .get_room(room_id)?
            .ok_or(RealtimeError::RoomNotFound(room_id))?;
        if !self.policy.can_access(user_id, &room)? {
            return Err(RealtimeError::AccessDenied { user_id, room_id });
        }
        Ok(room)
    }

    /// Rooms `user_id` may join, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or the policy data cannot be read.
    pub fn accessible_rooms(&self, user_id: UserId) -> Result<Vec<Room>> {
        let mut rooms = Vec::new();
        for room in self.store.list_rooms()? {
            if self.policy.can_access(user_id, &room)? {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }

    /// Authorize, register the session and announce it to the room.
    ///
    /// # Errors
    ///
    /// Returns `RoomNotFound` or `AccessDenied`; nothing is registered in that case.
    pub fn join(&self, room_id: RoomId, user_id: UserId) -> Result<RoomSession> {
        let room = self.authorize(room_id, user_id)?;
        let registration = self.admit(room_id, user_id, || self.announce(room_id, JOIN_NOTICE))?;
        Ok(RoomSession { room, registration })
    }

    /// Register a session and run `announce`. The session is removed again if the
    /// announcement fails.
    fn admit(
        &self,
        room_id: RoomId,
        user_id: UserId,
        announce: impl FnOnce() -> Result<()>,
    ) -> Result<Registration> {
        let registration = self.registry.register_room_session(room_id, user_id);
        if let Err(e) = announce() {
            self.registry
                .unregister_room_session(room_id, registration.connection_id);
            return Err(e);
        }
        tracing::info!(room_id = %room_id, user_id = %user_id, "User joined room");
        Ok(registration)
    }

    /// Persist a message and broadcast it to every session in the room, the author's
    /// included.
    ///
    /// Empty or whitespace-only text is ignored and yields `Ok(None)`. Otherwise the
    /// text is stored exactly as received.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be persisted.
    pub fn post(&self, room_id: RoomId, user_id: UserId, text: &str) -> Result<Option<StoredMessage>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let sequencer = self.sequencer(room_id);
        let _order = sequencer.lock();

        let saved = self.store.save_message(Channel::Room(room_id), user_id, text)?;
        let payload = ServerEvent::room_message(&saved).to_json()?;
        let report = self.registry.broadcast_to_room(room_id, &payload, None);

        tracing::debug!(
            room_id = %room_id,
            message_id = %saved.message_id,
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "Room message broadcast"
        );
        Ok(Some(saved))
    }

    /// Unregister a session and announce the departure.
    ///
    /// Call once per session when its task ends. A session pruned by a failed
    /// broadcast is already gone from the registry but is still announced here.
    ///
    /// # Errors
    ///
    /// Returns an error if the notice cannot be encoded.
    pub fn leave(&self, room_id: RoomId, user_id: UserId, connection_id: ConnectionId) -> Result<()> {
        if self.registry.unregister_room_session(room_id, connection_id) {
            tracing::info!(room_id = %room_id, user_id = %user_id, "User left room");
        } else {
            tracing::info!(room_id = %room_id, user_id = %user_id, "Pruned session left room");
        }
        self.announce(room_id, LEAVE_NOTICE)
    }

    /// The most recent messages of a room, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RoomNotFound` or `AccessDenied`, or a storage error.
    pub fn history(&self, room_id: RoomId, user_id: UserId, limit: usize) -> Result<Vec<StoredMessage>> {
        self.authorize(room_id, user_id)?;
        Ok(self.store.list_messages(Channel::Room(room_id), limit)?)
    }

    /// Number of sessions in a room.
    #[must_use]
    pub fn online_count(&self, room_id: RoomId) -> usize {
        self.registry.room_member_count(room_id)
    }

    fn announce(&self, room_id: RoomId, notice: &str) -> Result<()> {
        let event = ServerEvent::System {
            message: notice.to_string(),
            online_count: self.registry.room_member_count(room_id),
        };
        self.registry
            .broadcast_to_room(room_id, &event.to_json()?, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_store::{NewRoom, RocksStore, RoomKind};
    use serde_json::Value;
    use tempfile::TempDir;

    struct Fixture {
        chat: RoomChat<RocksStore>,
        store: Arc<RocksStore>,
        registry: Arc<ConnectionRegistry>,
        open: RoomId,
        restricted: RoomId,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        fixture_with_buffer(crate::registry::DEFAULT_OUTBOUND_BUFFER)
    }

    fn fixture_with_buffer(outbound_buffer: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let registry = Arc::new(ConnectionRegistry::new(outbound_buffer));
        let open = store
            .create_room(NewRoom {
                name: "Lobby".into(),
                description: String::new(),
                kind: RoomKind::Open,
            })
            .unwrap()
            .room_id;
        let restricted = store
            .create_room(NewRoom {
                name: "Compilers".into(),
                description: String::new(),
                kind: RoomKind::Restricted {
                    attribute: "compilers|park".into(),
                },
            })
            .unwrap()
            .room_id;
        let chat = RoomChat::with_store_policy(Arc::clone(&store), Arc::clone(&registry));
        Fixture {
            chat,
            store,
            registry,
            open,
            restricted,
            _dir: dir,
        }
    }

    fn next_json(registration: &mut Registration) -> Value {
        serde_json::from_str(&registration.receiver.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn authorize_errors() {
        let f = fixture();
        let user = UserId::new(1);

        assert!(matches!(
            f.chat.authorize(RoomId::new(99), user),
            Err(RealtimeError::RoomNotFound(_))
        ));
        assert!(matches!(
            f.chat.join(f.restricted, user),
            Err(RealtimeError::AccessDenied { .. })
        ));
        assert_eq!(f.registry.room_member_count(f.restricted), 0);

        f.store.grant_attribute(user, "compilers|park").unwrap();
        assert!(f.chat.join(f.restricted, user).is_ok());
    }

    #[test]
    fn catalog_lists_accessible_rooms() {
        let f = fixture();
        let user = UserId::new(1);
        let names = |rooms: Vec<Room>| rooms.into_iter().map(|r| r.name).collect::<Vec<_>>();

        assert_eq!(names(f.chat.accessible_rooms(user).unwrap()), vec!["Lobby"]);
        f.store.grant_attribute(user, "compilers|park").unwrap();
        assert_eq!(
            names(f.chat.accessible_rooms(user).unwrap()),
            vec!["Lobby", "Compilers"]
        );
    }

    #[test]
    fn join_announces_presence() {
        let f = fixture();
        let mut a = f.chat.join(f.open, UserId::new(1)).unwrap();
        let first = next_json(&mut a.registration);
        assert_eq!(first["type"], "system");
        assert_eq!(first["online_count"], 1);

        let mut b = f.chat.join(f.open, UserId::new(2)).unwrap();
        assert_eq!(next_json(&mut a.registration)["online_count"], 2);
        assert_eq!(next_json(&mut b.registration)["online_count"], 2);

        f.chat
            .leave(f.open, UserId::new(2), b.registration.connection_id)
            .unwrap();
        let notice = next_json(&mut a.registration);
        assert_eq!(notice["type"], "system");
        assert_eq!(notice["online_count"], 1);
        assert_eq!(f.chat.online_count(f.open), 1);
    }

    #[test]
    fn pruned_session_departure_is_announced() {
        let f = fixture_with_buffer(1);
        let slow = f.chat.join(f.open, UserId::new(1)).unwrap();
        let mut b = f.chat.join(f.open, UserId::new(2)).unwrap();
        // The join notice to `slow` overflowed its buffer and pruned it
        assert_eq!(next_json(&mut b.registration)["online_count"], 2);
        assert_eq!(f.chat.online_count(f.open), 1);

        f.chat
            .leave(f.open, UserId::new(1), slow.registration.connection_id)
            .unwrap();
        let notice = next_json(&mut b.registration);
        assert_eq!(notice["type"], "system");
        assert_eq!(notice["message"], LEAVE_NOTICE);
        assert_eq!(notice["online_count"], 1);
    }

    #[test]
    fn failed_announcement_unregisters_the_session() {
        let f = fixture();
        let result = f.chat.admit(f.open, UserId::new(1), || {
            Err(RealtimeError::RoomNotFound(f.open))
        });
        assert!(result.is_err());
        assert_eq!(f.chat.online_count(f.open), 0);

        assert!(f.chat.admit(f.open, UserId::new(1), || Ok(())).is_ok());
        assert_eq!(f.chat.online_count(f.open), 1);
    }

    #[test]
    fn post_round_trip() {
        let f = fixture();
        let mut a = f.chat.join(f.open, UserId::new(1)).unwrap();
        let mut b = f.chat.join(f.open, UserId::new(2)).unwrap();
        while a.registration.receiver.try_recv().is_ok() {}
        while b.registration.receiver.try_recv().is_ok() {}

        let text = "  see you at the library ";
        let saved = f.chat.post(f.open, UserId::new(1), text).unwrap().unwrap();
        assert_eq!(saved.body, text);

        for session in [&mut a, &mut b] {
            let event = next_json(&mut session.registration);
            assert_eq!(event["type"], "message");
            assert_eq!(event["message"], text);
            assert_eq!(event["sender"], "Anonymous7");
            assert_eq!(event["id"], saved.message_id.get());
            // Exactly once
            assert!(session.registration.receiver.try_recv().is_err());
        }

        let history = f.chat.history(f.open, UserId::new(2), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].body, text);
    }

    #[test]
    fn blank_messages_are_ignored() {
        let f = fixture();
        let mut a = f.chat.join(f.open, UserId::new(1)).unwrap();
        while a.registration.receiver.try_recv().is_ok() {}

        assert!(f.chat.post(f.open, UserId::new(1), "   \n\t").unwrap().is_none());
        assert!(f.chat.post(f.open, UserId::new(1), "").unwrap().is_none());
        assert!(a.registration.receiver.try_recv().is_err());
        assert!(f.chat.history(f.open, UserId::new(1), 10).unwrap().is_empty());
    }

    #[test]
    fn concurrent_posts_arrive_in_commit_order() {
        let f = fixture();
        let mut watcher = f.chat.join(f.open, UserId::new(100)).unwrap();
        while watcher.registration.receiver.try_recv().is_ok() {}

        let chat = Arc::new(f.chat);
        let handles: Vec<_> = (1..=4)
            .map(|user| {
                let chat = Arc::clone(&chat);
                let room = f.open;
                std::thread::spawn(move || {
                    for i in 0..10 {
                        chat.post(room, UserId::new(user), &format!("{user}-{i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids = Vec::new();
        while let Ok(frame) = watcher.registration.receiver.try_recv() {
            let event: Value = serde_json::from_str(&frame).unwrap();
            ids.push(event["id"].as_u64().unwrap());
        }
        assert_eq!(ids.len(), 40);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
