//! Room access policy.

use std::sync::Arc;

use campus_core::UserId;
use campus_store::{Room, RoomKind, RoomStore};

use crate::error::Result;

/// Decides whether a user may join a room.
pub trait RoomAccessPolicy: Send + Sync {
    /// Whether `user_id` may join `room`.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy's backing data cannot be read.
    fn can_access(&self, user_id: UserId, room: &Room) -> Result<bool>;
}

/// Admits everyone to open rooms, and to restricted rooms only the holders of the
/// room's attribute grant.
pub struct StoreAccessPolicy<S> {
    store: Arc<S>,
}

impl<S> StoreAccessPolicy<S> {
    /// Create a policy backed by `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RoomStore> RoomAccessPolicy for StoreAccessPolicy<S> {
    fn can_access(&self, user_id: UserId, room: &Room) -> Result<bool> {
        match &room.kind {
            RoomKind::Open => Ok(true),
            RoomKind::Restricted { attribute } => {
                Ok(self.store.has_attribute(user_id, attribute)?)
            }
        }
    }
}
