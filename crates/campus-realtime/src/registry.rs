//! Live connection registry.
//!
//! The registry is the process-local source of truth for which sessions are connected.
//! Room sessions are grouped per room for broadcast; random-chat sessions are keyed by
//! user, one per user. Each session owns the receiving half of a bounded channel that
//! its connection task drains onto the socket; the registry only holds senders.
//!
//! Sends never happen while a registry lock is held: broadcasts snapshot the room's
//! senders, send, then prune failed sessions under the lock afterwards. A session whose
//! buffer is full or whose receiver is gone counts as a failed send.

use std::collections::HashMap;
use std::sync::Arc;

use campus_core::{ConnectionId, RoomId, UserId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

/// Default outbound buffer per session, in messages.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// A live session as seen by the registry.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique identifier of the connection.
    pub connection_id: ConnectionId,
    /// Owning user.
    pub user_id: UserId,
    /// The room, for room sessions.
    pub room_id: Option<RoomId>,
    outbound: mpsc::Sender<String>,
}

impl Session {
    fn try_send(&self, payload: &str) -> bool {
        self.outbound.try_send(payload.to_string()).is_ok()
    }
}

/// Handle returned to the connection task that registered a session.
#[derive(Debug)]
pub struct Registration {
    /// Identifier to unregister with.
    pub connection_id: ConnectionId,
    /// Payloads addressed to this session. Yields `None` once the registry drops the
    /// session (unregistered, pruned, or evicted).
    pub receiver: mpsc::Receiver<String>,
}

/// Outcome of a one-to-one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was queued on the user's session.
    Delivered,
    /// The user has no random-chat session.
    NotConnected,
    /// The send failed; the session was evicted.
    Failed,
}

impl Delivery {
    /// Whether the payload reached a session.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Outcome of a room broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the payload was queued on.
    pub delivered: usize,
    /// Sessions that failed and were removed from the room.
    pub pruned: Vec<ConnectionId>,
}

#[derive(Default)]
struct RoomSessions {
    sessions: HashMap<ConnectionId, Session>,
    /// Set once the room is removed from the outer map; registrations must retry.
    retired: bool,
}

/// Process-local registry of live sessions.
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomSessions>>>>,
    users: Mutex<HashMap<UserId, Session>>,
    outbound_buffer: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_BUFFER)
    }
}

impl ConnectionRegistry {
    /// Create a registry whose sessions buffer up to `outbound_buffer` payloads.
    #[must_use]
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    fn new_session(
        &self,
        user_id: UserId,
        room_id: Option<RoomId>,
    ) -> (Session, Registration) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let connection_id = ConnectionId::generate();
        let session = Session {
            connection_id,
            user_id,
            room_id,
            outbound: tx,
        };
        let registration = Registration {
            connection_id,
            receiver: rx,
        };
        (session, registration)
    }

    fn room_entry(&self, room_id: RoomId) -> Arc<Mutex<RoomSessions>> {
        if let Some(room) = self.rooms.read().get(&room_id) {
            return Arc::clone(room);
        }
        Arc::clone(self.rooms.write().entry(room_id).or_default())
    }

    /// Drop a room from the map if it has no sessions left.
    fn retire_if_empty(&self, room_id: RoomId) {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.get(&room_id) else {
            return;
        };
        let mut sessions = room.lock();
        if sessions.sessions.is_empty() {
            sessions.retired = true;
            drop(sessions);
            rooms.remove(&room_id);
        }
    }

    // =========================================================================
    // Room sessions
    // =========================================================================

    /// Register a session in a room. Access must already have been checked.
    pub fn register_room_session(&self, room_id: RoomId, user_id: UserId) -> Registration {
        let (session, registration) = self.new_session(user_id, Some(room_id));
        loop {
            let room = self.room_entry(room_id);
            let mut sessions = room.lock();
            if sessions.retired {
                continue;
            }
            sessions.sessions.insert(session.connection_id, session);
            break;
        }
        tracing::debug!(
            room_id = %room_id,
            user_id = %user_id,
            connection_id = %registration.connection_id,
            "Room session registered"
        );
        registration
    }

    /// Remove a session from a room. Returns whether it was present.
    pub fn unregister_room_session(&self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let Some(room) = self.rooms.read().get(&room_id).cloned() else {
            return false;
        };
        let (removed, now_empty) = {
            let mut sessions = room.lock();
            let removed = sessions.sessions.remove(&connection_id).is_some();
            (removed, sessions.sessions.is_empty())
        };
        if now_empty {
            self.retire_if_empty(room_id);
        }
        removed
    }

    /// Send `payload` to every session in a room except those owned by `exclude`.
    ///
    /// Failed sessions are removed from the room; delivery to the rest continues.
    pub fn broadcast_to_room(
        &self,
        room_id: RoomId,
        payload: &str,
        exclude: Option<UserId>,
    ) -> BroadcastReport {
        let Some(room) = self.rooms.read().get(&room_id).cloned() else {
            return BroadcastReport::default();
        };
        let snapshot: Vec<Session> = room
            .lock()
            .sessions
            .values()
            .filter(|s| Some(s.user_id) != exclude)
            .cloned()
            .collect();

        let mut report = BroadcastReport::default();
        for session in &snapshot {
            if session.try_send(payload) {
                report.delivered += 1;
            } else {
                report.pruned.push(session.connection_id);
            }
        }

        if !report.pruned.is_empty() {
            let now_empty = {
                let mut sessions = room.lock();
                for connection_id in &report.pruned {
                    sessions.sessions.remove(connection_id);
                }
                sessions.sessions.is_empty()
            };
            tracing::debug!(
                room_id = %room_id,
                pruned = report.pruned.len(),
                "Pruned dead room sessions"
            );
            if now_empty {
                self.retire_if_empty(room_id);
            }
        }

        report
    }

    /// Number of sessions currently in a room.
    #[must_use]
    pub fn room_member_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .read()
            .get(&room_id)
            .map_or(0, |room| room.lock().sessions.len())
    }

    // =========================================================================
    // User (random-chat) sessions
    // =========================================================================

    /// Register a user's random-chat session, evicting any previous one.
    pub fn register_user_session(&self, user_id: UserId) -> Registration {
        let (session, registration) = self.new_session(user_id, None);
        let previous = self.users.lock().insert(user_id, session);
        if let Some(previous) = previous {
            tracing::debug!(
                user_id = %user_id,
                evicted = %previous.connection_id,
                "Replaced existing random-chat session"
            );
        }
        registration
    }

    /// Remove a user's random-chat session. Returns whether one was present.
    pub fn unregister_user_session(&self, user_id: UserId) -> bool {
        self.users.lock().remove(&user_id).is_some()
    }

    /// Remove a user's session only if it is still `connection_id`.
    ///
    /// Returns `false` when the session was already replaced by a newer connection.
    pub fn release_user_session(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut users = self.users.lock();
        if users
            .get(&user_id)
            .is_some_and(|s| s.connection_id == connection_id)
        {
            users.remove(&user_id);
            true
        } else {
            false
        }
    }

    /// Free the user's slot on behalf of `connection_id`.
    ///
    /// Returns `false` only when a different connection holds the slot. A slot that
    /// is already empty, for instance after a failed send evicted the session,
    /// counts as vacated.
    pub fn vacate_user_session(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut users = self.users.lock();
        match users.get(&user_id) {
            Some(s) if s.connection_id != connection_id => false,
            Some(_) => {
                users.remove(&user_id);
                true
            }
            None => true,
        }
    }

    /// Send `payload` to a user's random-chat session. A failed session is evicted.
    pub fn send_to_user(&self, user_id: UserId, payload: &str) -> Delivery {
        let Some(session) = self.users.lock().get(&user_id).cloned() else {
            return Delivery::NotConnected;
        };
        if session.try_send(payload) {
            return Delivery::Delivered;
        }

        self.release_user_session(user_id, session.connection_id);
        tracing::debug!(user_id = %user_id, "Evicted dead random-chat session");
        Delivery::Failed
    }

    /// Whether a user holds a random-chat session.
    #[must_use]
    pub fn is_user_connected(&self, user_id: UserId) -> bool {
        self.users.lock().contains_key(&user_id)
    }

    /// The current random-chat connection of a user.
    #[must_use]
    pub fn user_connection(&self, user_id: UserId) -> Option<ConnectionId> {
        self.users.lock().get(&user_id).map(|s| s.connection_id)
    }
}
