//! Real-time chat core for the campus services.
//!
//! This crate owns live connection state and the two chat flows built on it:
//! room chat (persist, then broadcast to every session in the room) and anonymous
//! random chat (pair two waiting users, then route messages one-to-one).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP/WS)                       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//!        ┌─────────────────┐         ┌──────────────────────────┐
//!        │    RoomChat     │         │  RandomMatchCoordinator  │
//!        │ (access policy) │         │  (queue + pairings)      │
//!        └─────────────────┘         └──────────────────────────┘
//!                 │     ┌────────────────────┐   │
//!                 ├────▶│ ConnectionRegistry │◀──┤
//!                 │     └────────────────────┘   │
//!                 ▼                              ▼
//!        ┌─────────────────────────────────────────────────────┐
//!        │                  Store (RocksDB)                    │
//!        └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_core::UserId;
//! use campus_realtime::{ConnectionRegistry, MatchConfig, MatchState, RandomMatchCoordinator};
//! use campus_store::RocksStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/campus-db")?);
//! let registry = Arc::new(ConnectionRegistry::default());
//! let random = RandomMatchCoordinator::new(store, Arc::clone(&registry), MatchConfig::default());
//!
//! let user = UserId::new(7);
//! let mut session = registry.register_user_session(user);
//! if random.start(user)? == MatchState::Waiting {
//!     println!("waiting for a partner");
//! }
//! # let _ = session.receiver.try_recv();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod access;
pub mod error;
pub mod protocol;
pub mod random;
pub mod registry;
pub mod room;
pub mod types;

pub use access::{RoomAccessPolicy, StoreAccessPolicy};
pub use error::{RealtimeError, Result};
pub use protocol::{parse_inbound, RandomInbound, RoomInbound, ServerEvent};
pub use random::{MatchState, RandomMatchCoordinator, SentMessage};
pub use registry::{BroadcastReport, ConnectionRegistry, Delivery, Registration, DEFAULT_OUTBOUND_BUFFER};
pub use room::{RoomChat, RoomSession};
pub use types::MatchConfig;
