//! HTTP and WebSocket gateway for the campus realtime services.
//!
//! This crate is the public surface of the service. It handles:
//!
//! - JWT authentication (Bearer header for HTTP, `?token=` for sockets)
//! - Room chat sockets and room history
//! - Random one-to-one chat sockets and their HTTP companions
//! - Commute schedules, the on-demand match trigger and group lookups
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                   (HTTP / WebSocket)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     campus-gateway                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Auth      │ │   Router    │ │  WebSocket          │    │
//! │  │  Extractor  │ │  + Handlers │ │  sessions           │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Realtime │   │ Commute  │   │  Store   │
//!        │ (chat)   │   │ (groups) │   │ (RocksDB)│
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_auth::{AuthConfig, Hs256Validator};
//! use campus_commute::CommuteConfig;
//! use campus_gateway::{create_router, GatewayConfig, GatewayState};
//! use campus_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/campus")?);
//! let jwt_validator = Arc::new(Hs256Validator::new(&AuthConfig::from_env()?)?);
//!
//! let state = GatewayState::new(
//!     store,
//!     jwt_validator,
//!     GatewayConfig::default(),
//!     CommuteConfig::default(),
//! );
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, CloseReason};
pub use routes::create_router;
pub use state::GatewayState;

pub use auth::AuthUser;
