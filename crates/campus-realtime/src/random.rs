//! Random one-to-one chat matching.
//!
//! A user is idle, waiting in the persisted queue, or matched in an active pairing.
//! The queue is durable but sessions are not, so a queued user counts as a candidate
//! only while the registry still holds their session. Entries of users who went away
//! are deleted when a scan finds them.
//!
//! Candidate selection, pairing creation and queue removal are a single store
//! transaction guarded by the one-active-pairing-per-user index. A caller that loses
//! a race gets a conflict and rescans.

use std::sync::Arc;

use campus_core::{ConnectionId, PairingId, UserId};
use campus_store::{
    Channel, MatchStore, MessageStore, QueueInsert, RandomPairing, StoreError, StoredMessage,
};

use crate::error::{RealtimeError, Result};
use crate::protocol::ServerEvent;
use crate::registry::{ConnectionRegistry, Delivery};
use crate::types::MatchConfig;

/// Where a user stands in random chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchState {
    /// Neither queued nor paired.
    Idle,
    /// Queued, waiting for a partner.
    Waiting,
    /// In an active pairing.
    Matched {
        /// The pairing.
        pairing: RandomPairing,
        /// Whether the pairing was created by this call. Both members have already
        /// been sent a `matched` frame in that case.
        fresh: bool,
    },
}

impl MatchState {
    /// The active pairing, if matched.
    #[must_use]
    pub const fn pairing(&self) -> Option<&RandomPairing> {
        match self {
            Self::Matched { pairing, .. } => Some(pairing),
            Self::Idle | Self::Waiting => None,
        }
    }

    /// The frame announcing this state to the user, if any.
    #[must_use]
    pub fn event(&self) -> Option<ServerEvent> {
        match self {
            Self::Idle => None,
            Self::Waiting => Some(ServerEvent::Waiting),
            Self::Matched { pairing, .. } => Some(ServerEvent::Matched {
                room_id: pairing.pairing_id,
            }),
        }
    }
}

/// A message accepted into a pairing.
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// The persisted message.
    pub message: StoredMessage,
    /// Whether the partner's session received it.
    pub partner_delivery: Delivery,
}

/// Pairs waiting users and routes their messages.
pub struct RandomMatchCoordinator<S> {
    store: Arc<S>,
    registry: Arc<ConnectionRegistry>,
    config: MatchConfig,
}

impl<S> RandomMatchCoordinator<S>
where
    S: MatchStore + MessageStore,
{
    /// Create a coordinator.
    #[must_use]
    pub const fn new(store: Arc<S>, registry: Arc<ConnectionRegistry>, config: MatchConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Enter random chat.
    ///
    /// Returns the existing pairing if there is one, `Waiting` if already queued,
    /// and otherwise pairs with the oldest live waiting user or joins the queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn start(&self, user_id: UserId) -> Result<MatchState> {
        if let Some(pairing) = self.store.pairing_find_active(user_id)? {
            return Ok(MatchState::Matched {
                pairing,
                fresh: false,
            });
        }
        if self.store.queue_get(user_id)?.is_some() {
            return Ok(MatchState::Waiting);
        }

        if let Some(pairing) = self.try_pair(user_id)? {
            self.announce_match(&pairing)?;
            return Ok(MatchState::Matched {
                pairing,
                fresh: true,
            });
        }

        match self.store.queue_insert(user_id) {
            Ok(QueueInsert::Inserted(entry)) => {
                tracing::debug!(user_id = %user_id, position = entry.position, "User queued");
                Ok(MatchState::Waiting)
            }
            Ok(QueueInsert::AlreadyQueued(_)) => Ok(MatchState::Waiting),
            // Someone paired with us between the scan and the insert
            Err(e) if e.is_conflict() => self.current_state(user_id),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-check a user's state, typically on a status poll while waiting.
    ///
    /// If another user's scan already paired this user, the stale queue entry is
    /// removed and the pairing returned. A waiting user also rescans for a live
    /// candidate, so two users who queued concurrently still meet.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn reconcile(&self, user_id: UserId) -> Result<MatchState> {
        if let Some(pairing) = self.store.pairing_find_active(user_id)? {
            if self.store.queue_delete(user_id)? {
                tracing::debug!(user_id = %user_id, "Removed stale queue entry of paired user");
            }
            return Ok(MatchState::Matched {
                pairing,
                fresh: false,
            });
        }
        if self.store.queue_get(user_id)?.is_none() {
            return Ok(MatchState::Idle);
        }

        if let Some(pairing) = self.try_pair(user_id)? {
            self.announce_match(&pairing)?;
            return Ok(MatchState::Matched {
                pairing,
                fresh: true,
            });
        }
        self.current_state(user_id)
    }

    /// Scan the queue for the oldest live candidate and pair with them.
    fn try_pair(&self, user_id: UserId) -> Result<Option<RandomPairing>> {
        let mut lost_races = 0;

        while let Some(candidate) = self.store.queue_lookup_oldest(user_id)? {
            let candidate = candidate.user_id;
            if !self.registry.is_user_connected(candidate) {
                self.store.queue_delete(candidate)?;
                tracing::debug!(user_id = %candidate, "Dropped stale queue entry");
                continue;
            }

            match self.store.pairing_create(candidate, user_id) {
                Ok(pairing) => {
                    tracing::info!(
                        pairing_id = %pairing.pairing_id,
                        user_a = %pairing.user_a,
                        user_b = %pairing.user_b,
                        "Users paired"
                    );
                    return Ok(Some(pairing));
                }
                Err(e) if e.is_conflict() => {
                    lost_races += 1;
                    tracing::debug!(user_id = %user_id, candidate = %candidate, error = %e, "Lost pairing race");
                    if lost_races >= self.config.max_pair_attempts
                        || self.store.pairing_find_active(user_id)?.is_some()
                    {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    fn current_state(&self, user_id: UserId) -> Result<MatchState> {
        if let Some(pairing) = self.store.pairing_find_active(user_id)? {
            return Ok(MatchState::Matched {
                pairing,
                fresh: false,
            });
        }
        if self.store.queue_get(user_id)?.is_some() {
            Ok(MatchState::Waiting)
        } else {
            Ok(MatchState::Idle)
        }
    }

    fn announce_match(&self, pairing: &RandomPairing) -> Result<()> {
        let payload = ServerEvent::Matched {
            room_id: pairing.pairing_id,
        }
        .to_json()?;
        for member in [pairing.user_a, pairing.user_b] {
            self.registry.send_to_user(member, &payload);
        }
        Ok(())
    }

    /// Send a message to the partner and echo it to the sender.
    ///
    /// `pairing_hint` is the pairing the client believes it is in; without it the
    /// sender's active pairing is used. Whitespace-only text is ignored. Delivery to
    /// the partner is best-effort: an offline partner reads it from history later.
    ///
    /// # Errors
    ///
    /// Returns `NotPaired` if the pairing is not active or the sender is not a member.
    pub fn send_message(
        &self,
        from: UserId,
        pairing_hint: Option<PairingId>,
        text: &str,
    ) -> Result<Option<SentMessage>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let pairing = match pairing_hint {
            Some(pairing_id) => self.store.pairing_get(pairing_id)?,
            None => self.store.pairing_find_active(from)?,
        }
        .filter(|p| p.active && p.includes(from))
        .ok_or(RealtimeError::NotPaired(from))?;
        let partner = pairing.partner_of(from).ok_or(RealtimeError::NotPaired(from))?;

        let message = self
            .store
            .save_message(Channel::Pairing(pairing.pairing_id), from, text)?;

        let to_partner = ServerEvent::pairing_message(&message, partner).to_json()?;
        let partner_delivery = self.registry.send_to_user(partner, &to_partner);
        let echo = ServerEvent::pairing_message(&message, from).to_json()?;
        self.registry.send_to_user(from, &echo);

        if !partner_delivery.is_delivered() {
            tracing::debug!(
                pairing_id = %pairing.pairing_id,
                partner = %partner,
                "Partner offline, message kept for history"
            );
        }
        Ok(Some(SentMessage {
            message,
            partner_delivery,
        }))
    }

    /// Leave random chat: drop any queue entry, end the active pairing and tell the
    /// partner. Returns the ended pairing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn end(&self, user_id: UserId) -> Result<Option<RandomPairing>> {
        self.store.queue_delete(user_id)?;

        let Some(active) = self.store.pairing_find_active(user_id)? else {
            return Ok(None);
        };
        let ended = match self.store.pairing_deactivate(active.pairing_id) {
            Ok(Some(ended)) => ended,
            // The partner ended it first
            Ok(None) | Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(pairing_id = %ended.pairing_id, user_id = %user_id, "Pairing ended");
        if let Some(partner) = ended.partner_of(user_id) {
            let payload = ServerEvent::PartnerLeft.to_json()?;
            self.registry.send_to_user(partner, &payload);
        }
        Ok(Some(ended))
    }

    /// Tear down after a session closes, unless a newer session of the same user
    /// replaced it. A session that was already evicted still ends its pairing.
    /// Returns the ended pairing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn disconnect(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<Option<RandomPairing>> {
        if !self.registry.vacate_user_session(user_id, connection_id) {
            tracing::debug!(user_id = %user_id, connection_id = %connection_id, "Session already replaced");
            return Ok(None);
        }
        self.end(user_id)
    }

    /// Leave the queue without touching any pairing. Returns whether the user was queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn cancel(&self, user_id: UserId) -> Result<bool> {
        Ok(self.store.queue_delete(user_id)?)
    }

    /// Whether `pairing_id` is still active. Non-members always see `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn pairing_active(&self, user_id: UserId, pairing_id: PairingId) -> Result<bool> {
        Ok(self
            .store
            .pairing_get(pairing_id)?
            .is_some_and(|p| p.active && p.includes(user_id)))
    }

    /// Message history of a pairing, visible to its members only.
    ///
    /// # Errors
    ///
    /// Returns `PairingNotFound` if the pairing is absent or `user_id` is not a member.
    pub fn history(
        &self,
        user_id: UserId,
        pairing_id: PairingId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.store
            .pairing_get(pairing_id)?
            .filter(|p| p.includes(user_id))
            .ok_or(RealtimeError::PairingNotFound(pairing_id))?;
        Ok(self
            .store
            .list_messages(Channel::Pairing(pairing_id), limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registration;
    use campus_store::RocksStore;
    use serde_json::Value;
    use tempfile::TempDir;

    struct Fixture {
        coordinator: Arc<RandomMatchCoordinator<RocksStore>>,
        store: Arc<RocksStore>,
        registry: Arc<ConnectionRegistry>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        fixture_with_buffer(crate::registry::DEFAULT_OUTBOUND_BUFFER)
    }

    fn fixture_with_buffer(outbound_buffer: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let registry = Arc::new(ConnectionRegistry::new(outbound_buffer));
        let coordinator = Arc::new(RandomMatchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            MatchConfig::default(),
        ));
        Fixture {
            coordinator,
            store,
            registry,
            _dir: dir,
        }
    }

    fn frames(registration: &mut Registration) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = registration.receiver.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn pairing_of(state: &MatchState) -> RandomPairing {
        *state.pairing().unwrap()
    }

    #[test]
    fn waiting_user_is_matched_by_next_arrival() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let mut x_session = f.registry.register_user_session(x);
        let mut y_session = f.registry.register_user_session(y);

        assert_eq!(f.coordinator.start(x).unwrap(), MatchState::Waiting);

        let y_state = f.coordinator.start(y).unwrap();
        assert!(matches!(y_state, MatchState::Matched { fresh: true, .. }));
        let pairing = pairing_of(&y_state);
        assert!(pairing.includes(x) && pairing.includes(y));

        let x_state = f.coordinator.reconcile(x).unwrap();
        assert_eq!(pairing_of(&x_state).pairing_id, pairing.pairing_id);
        assert!(f.store.queue_get(x).unwrap().is_none());

        for session in [&mut x_session, &mut y_session] {
            let received = frames(session);
            assert_eq!(received.len(), 1);
            assert_eq!(received[0]["type"], "matched");
            assert_eq!(received[0]["room_id"], pairing.pairing_id.get());
        }
    }

    #[test]
    fn start_twice_stays_waiting() {
        let f = fixture();
        let x = UserId::new(1);
        let _session = f.registry.register_user_session(x);

        assert_eq!(f.coordinator.start(x).unwrap(), MatchState::Waiting);
        let first = f.store.queue_get(x).unwrap().unwrap();
        assert_eq!(f.coordinator.start(x).unwrap(), MatchState::Waiting);
        assert_eq!(f.store.queue_get(x).unwrap().unwrap(), first);
        assert_eq!(f.coordinator.reconcile(x).unwrap(), MatchState::Waiting);
    }

    #[test]
    fn start_when_matched_returns_existing_pairing() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let _xs = f.registry.register_user_session(x);
        let _ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());

        let again = f.coordinator.start(x).unwrap();
        assert_eq!(
            again,
            MatchState::Matched {
                pairing,
                fresh: false
            }
        );
    }

    #[test]
    fn stale_queue_entries_are_skipped_and_deleted() {
        let f = fixture();
        let (ghost, live, newcomer) = (UserId::new(1), UserId::new(2), UserId::new(3));

        // The ghost queued but has no session any more
        f.store.queue_insert(ghost).unwrap();
        let _live_session = f.registry.register_user_session(live);
        f.coordinator.start(live).unwrap();
        let _newcomer_session = f.registry.register_user_session(newcomer);

        let pairing = pairing_of(&f.coordinator.start(newcomer).unwrap());
        assert!(pairing.includes(live));
        assert!(!pairing.includes(ghost));
        assert!(f.store.queue_get(ghost).unwrap().is_none());
    }

    #[test]
    fn only_stale_candidates_means_waiting() {
        let f = fixture();
        let (ghost, user) = (UserId::new(1), UserId::new(2));
        f.store.queue_insert(ghost).unwrap();
        let _session = f.registry.register_user_session(user);

        assert_eq!(f.coordinator.start(user).unwrap(), MatchState::Waiting);
        assert!(f.store.queue_get(ghost).unwrap().is_none());
        assert!(f.store.queue_get(user).unwrap().is_some());
    }

    #[test]
    fn reconcile_pairs_concurrently_queued_users() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let _xs = f.registry.register_user_session(x);
        let _ys = f.registry.register_user_session(y);
        // Both entered the queue without seeing each other
        f.store.queue_insert(x).unwrap();
        f.store.queue_insert(y).unwrap();

        let state = f.coordinator.reconcile(y).unwrap();
        assert!(matches!(state, MatchState::Matched { fresh: true, .. }));
        assert!(f.store.queue_get(x).unwrap().is_none());
        assert!(f.store.queue_get(y).unwrap().is_none());
    }

    #[test]
    fn reconcile_idle_user() {
        let f = fixture();
        assert_eq!(f.coordinator.reconcile(UserId::new(5)).unwrap(), MatchState::Idle);
    }

    #[test]
    fn messages_reach_partner_and_echo() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let mut xs = f.registry.register_user_session(x);
        let mut ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());
        frames(&mut xs);
        frames(&mut ys);

        let sent = f
            .coordinator
            .send_message(x, Some(pairing.pairing_id), "hi there")
            .unwrap()
            .unwrap();
        assert!(sent.partner_delivery.is_delivered());
        assert_eq!(sent.message.body, "hi there");

        let to_partner = frames(&mut ys);
        assert_eq!(to_partner.len(), 1);
        assert_eq!(to_partner[0]["sender"], "peer");
        assert_eq!(to_partner[0]["is_mine"], false);
        let echo = frames(&mut xs);
        assert_eq!(echo.len(), 1);
        assert_eq!(echo[0]["is_mine"], true);

        let history = f.coordinator.history(y, pairing.pairing_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert!(matches!(
            f.coordinator.history(UserId::new(9), pairing.pairing_id, 10),
            Err(RealtimeError::PairingNotFound(_))
        ));
    }

    #[test]
    fn messaging_without_pairing_fails() {
        let f = fixture();
        let (x, y, outsider) = (UserId::new(1), UserId::new(2), UserId::new(3));

        assert!(matches!(
            f.coordinator.send_message(x, None, "hello"),
            Err(RealtimeError::NotPaired(_))
        ));
        assert!(f.coordinator.send_message(x, None, "   ").unwrap().is_none());

        let _xs = f.registry.register_user_session(x);
        let _ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());
        assert!(matches!(
            f.coordinator
                .send_message(outsider, Some(pairing.pairing_id), "let me in"),
            Err(RealtimeError::NotPaired(_))
        ));

        f.coordinator.end(x).unwrap();
        assert!(matches!(
            f.coordinator.send_message(y, Some(pairing.pairing_id), "still there?"),
            Err(RealtimeError::NotPaired(_))
        ));
    }

    #[test]
    fn offline_partner_is_not_an_error() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let _xs = f.registry.register_user_session(x);
        let ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        f.coordinator.start(y).unwrap();
        f.registry.release_user_session(y, ys.connection_id);

        let sent = f.coordinator.send_message(x, None, "are you there").unwrap().unwrap();
        assert_eq!(sent.partner_delivery, Delivery::NotConnected);
    }

    #[test]
    fn disconnect_notifies_partner_and_keeps_history() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let xs = f.registry.register_user_session(x);
        let mut ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());
        frames(&mut ys);

        let ended = f.coordinator.disconnect(x, xs.connection_id).unwrap().unwrap();
        assert_eq!(ended.pairing_id, pairing.pairing_id);
        assert!(!f.registry.is_user_connected(x));

        let received = frames(&mut ys);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["type"], "partner_left");

        assert!(!f.coordinator.pairing_active(y, pairing.pairing_id).unwrap());
        assert!(f.store.pairing_get(pairing.pairing_id).unwrap().is_some());
        // The partner requeues explicitly
        assert_eq!(f.coordinator.reconcile(y).unwrap(), MatchState::Idle);
        assert_eq!(f.coordinator.start(y).unwrap(), MatchState::Waiting);
    }

    #[test]
    fn disconnect_of_replaced_session_is_ignored() {
        let f = fixture();
        let (x, y) = (UserId::new(1), UserId::new(2));
        let old = f.registry.register_user_session(x);
        let _ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());

        let _new = f.registry.register_user_session(x);
        assert!(f.coordinator.disconnect(x, old.connection_id).unwrap().is_none());
        assert!(f.coordinator.pairing_active(x, pairing.pairing_id).unwrap());
        assert!(f.registry.is_user_connected(x));
    }

    #[test]
    fn evicted_session_cleanup_ends_pairing() {
        let f = fixture_with_buffer(1);
        let (x, y) = (UserId::new(1), UserId::new(2));
        let mut xs = f.registry.register_user_session(x);
        let mut ys = f.registry.register_user_session(y);
        f.coordinator.start(x).unwrap();
        let pairing = pairing_of(&f.coordinator.start(y).unwrap());
        frames(&mut ys);

        // x never read its `matched` frame, so the next send overflows and evicts it
        let sent = f.coordinator.send_message(y, None, "hello?").unwrap().unwrap();
        assert_eq!(sent.partner_delivery, Delivery::Failed);
        assert!(!f.registry.is_user_connected(x));
        frames(&mut ys);
        assert_eq!(frames(&mut xs).len(), 1);
        assert!(xs.receiver.try_recv().is_err());

        let ended = f.coordinator.disconnect(x, xs.connection_id).unwrap().unwrap();
        assert_eq!(ended.pairing_id, pairing.pairing_id);
        assert!(!f.coordinator.pairing_active(y, pairing.pairing_id).unwrap());
        let received = frames(&mut ys);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["type"], "partner_left");
    }

    #[test]
    fn cancel_leaves_queue() {
        let f = fixture();
        let x = UserId::new(1);
        let _xs = f.registry.register_user_session(x);
        f.coordinator.start(x).unwrap();

        assert!(f.coordinator.cancel(x).unwrap());
        assert!(!f.coordinator.cancel(x).unwrap());
        assert_eq!(f.coordinator.reconcile(x).unwrap(), MatchState::Idle);
    }

    #[test]
    fn concurrent_starts_never_share_a_user() {
        let f = fixture();
        let users: Vec<UserId> = (1..=12).map(UserId::new).collect();
        let _sessions: Vec<_> = users
            .iter()
            .map(|&u| f.registry.register_user_session(u))
            .collect();

        let handles: Vec<_> = users
            .iter()
            .map(|&u| {
                let coordinator = Arc::clone(&f.coordinator);
                std::thread::spawn(move || coordinator.start(u).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // Let anyone left waiting rescan
        for &u in &users {
            f.coordinator.reconcile(u).unwrap();
        }

        let mut paired = std::collections::HashSet::new();
        for &u in &users {
            if let Some(pairing) = f.store.pairing_find_active(u).unwrap() {
                let partner = pairing.partner_of(u).unwrap();
                assert_eq!(
                    f.store.pairing_find_active(partner).unwrap().unwrap().pairing_id,
                    pairing.pairing_id
                );
                assert!(f.store.queue_get(u).unwrap().is_none());
                paired.insert(u);
            }
        }
        assert_eq!(paired.len(), users.len());
    }
}
