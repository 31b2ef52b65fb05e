//! Campus gateway - HTTP/WebSocket entry point.
//!
//! Serves room chat, random chat and commute matching from one process, with the
//! periodic commute sweep running alongside the server.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock JWT validator instead of the
//! HS256 secret. Use tokens in format: `test-token:<user-id>`

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use campus_auth::MockJwtValidator;
#[cfg(not(feature = "dev-mode"))]
use campus_auth::{AuthConfig, Hs256Validator};
use campus_commute::{CommuteConfig, SweepRunner};
use campus_gateway::{create_router, GatewayConfig, GatewayState};
use campus_store::{NewRoom, RocksStore, RoomKind, RoomStore};

const DEFAULT_ROOM_NAME: &str = "Campus Lounge";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting campus gateway");

    let config = GatewayConfig::from_env();
    let commute_config = CommuteConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        sweep_interval_seconds = commute_config.sweep_interval_seconds,
        group_size_cap = commute_config.group_size_cap,
        "Gateway configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);
    seed_default_room(&store)?;

    #[cfg(feature = "dev-mode")]
    let jwt_validator = {
        tracing::warn!("DEV MODE ENABLED - using mock JWT validator");
        tracing::warn!("Use tokens in format: test-token:<user-id>");
        Arc::new(MockJwtValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let jwt_validator = Arc::new(Hs256Validator::new(&AuthConfig::from_env()?)?);
    tracing::info!("JWT validator initialized");

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(store, jwt_validator, config, commute_config.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = SweepRunner::new(
        Arc::clone(&state.commute),
        commute_config.scheduled,
        commute_config.sweep_interval(),
    )
    .spawn(shutdown_rx);

    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Commute sweep task panicked");
    }
    tracing::info!("Gateway stopped");

    Ok(())
}

/// Make sure a fresh deployment has somewhere to talk.
fn seed_default_room(store: &RocksStore) -> campus_store::Result<()> {
    if !store.list_rooms()?.is_empty() {
        return Ok(());
    }
    let room = store.create_room(NewRoom {
        name: DEFAULT_ROOM_NAME.to_string(),
        description: "Open to everyone on campus".to_string(),
        kind: RoomKind::Open,
    })?;
    tracing::info!(room_id = %room.room_id, name = %room.name, "Seeded default room");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
