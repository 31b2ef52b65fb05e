//! Core types and utilities for the campus realtime services.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - **Identifiers**: Strongly-typed IDs for users, rooms, messages, pairings, and groups
//! - **Time**: Minute-resolution time of day and commute direction
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use campus_core::{ConnectionId, MinuteOfDay, RoomId, UserId};
//!
//! let user_id: UserId = "42".parse().unwrap();
//! let room_id = RoomId::new(1);
//! let connection = ConnectionId::generate();
//!
//! let departure: MinuteOfDay = "08:03".parse().unwrap();
//! assert_eq!(departure.minutes(), 483);
//! # let _ = (user_id, room_id, connection);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod time;

pub use error::{CoreError, Result};
pub use ids::{ConnectionId, GroupId, IdError, MessageId, PairingId, PreferenceId, RoomId, UserId};
pub use time::{Direction, MinuteOfDay, TimeError, MINUTES_PER_DAY};
