//! WebSocket session handlers.
//!
//! Authentication and room access are checked before the session starts. A
//! handshake that fails after the upgrade is closed with a [`CloseReason`] code.
//!
//! Each session task owns its socket and multiplexes three sources: frames the
//! registry routes to it, frames from the client, and a ping timer. A client that
//! sends nothing (not even a pong) for the idle window is dropped through the
//! same cleanup path as an explicit disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

use campus_auth::JwtValidator;
use campus_core::{RoomId, UserId};
use campus_realtime::{
    parse_inbound, MatchState, RandomInbound, RealtimeError, RoomInbound, ServerEvent,
};
use campus_store::Store;

use crate::auth::{authenticate_socket, header_token, TokenQuery};
use crate::error::CloseReason;
use crate::state::GatewayState;

/// What the session loop does after handling a client frame.
enum Flow {
    Continue,
    Reply(ServerEvent),
    Close,
}

/// Why a session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The client closed the socket, errored, or asked to leave.
    ClientGone,
    /// The registry dropped the session.
    Evicted,
    /// No frames within the idle window.
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct Liveness {
    heartbeat: Duration,
    idle_timeout: Duration,
}

impl Liveness {
    fn from_state<S: Store, V: JwtValidator>(state: &GatewayState<S, V>) -> Self {
        Self {
            heartbeat: state.config.heartbeat_interval(),
            idle_timeout: state.config.websocket_timeout(),
        }
    }
}

/// Upgrade, then close immediately with `reason`.
fn reject(ws: WebSocketUpgrade, reason: CloseReason) -> Response {
    tracing::warn!(close_code = reason.code(), reason = reason.reason(), "WebSocket handshake refused");
    ws.on_upgrade(move |mut socket| async move {
        close(&mut socket, reason).await;
    })
}

async fn close(socket: &mut WebSocket, reason: CloseReason) {
    let frame = CloseFrame {
        code: reason.code(),
        reason: reason.reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    match event.to_json() {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode event");
            true
        }
    }
}

/// Drive a session until the client leaves, the registry drops it, or it idles out.
async fn run_session<F>(
    socket: &mut WebSocket,
    outbound: &mut mpsc::Receiver<String>,
    liveness: Liveness,
    mut on_text: F,
) -> SessionEnd
where
    F: FnMut(&str) -> Flow,
{
    let mut heartbeat = interval(liveness.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    let idle = sleep(liveness.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        return SessionEnd::ClientGone;
                    }
                }
                None => return SessionEnd::Evicted,
            },
            inbound = socket.recv() => {
                let Some(Ok(message)) = inbound else {
                    return SessionEnd::ClientGone;
                };
                idle.as_mut().reset(Instant::now() + liveness.idle_timeout);
                match message {
                    Message::Text(text) => match on_text(text.as_str()) {
                        Flow::Continue => {}
                        Flow::Reply(event) => {
                            if !send_event(socket, &event).await {
                                return SessionEnd::ClientGone;
                            }
                        }
                        Flow::Close => return SessionEnd::ClientGone,
                    },
                    Message::Close(_) => return SessionEnd::ClientGone,
                    Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = heartbeat.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    return SessionEnd::ClientGone;
                }
            }
            () = &mut idle => return SessionEnd::Idle,
        }
    }
}

// =============================================================================
// Room chat
// =============================================================================

/// Room chat socket: `GET /v1/rooms/:room_id/ws?token=<jwt>`.
pub async fn room_socket<S, V>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState<S, V>>>,
    Path(room_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let user_id = match authenticate_socket(&*state.jwt_validator, &query, header_token(&headers)).await {
        Ok(user) => user.user_id,
        Err(e) => {
            tracing::debug!(error = %e, "Room socket auth failed");
            return reject(ws, CloseReason::InvalidToken);
        }
    };
    let Ok(room_id) = room_id.parse::<RoomId>() else {
        return reject(ws, CloseReason::RoomNotFound);
    };
    if let Err(e) = state.rooms.authorize(room_id, user_id) {
        return reject(ws, CloseReason::from(&e));
    }

    ws.on_upgrade(move |socket| room_session(socket, state, room_id, user_id))
}

async fn room_session<S, V>(
    mut socket: WebSocket,
    state: Arc<GatewayState<S, V>>,
    room_id: RoomId,
    user_id: UserId,
) where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let mut session = match state.rooms.join(room_id, user_id) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(room_id = %room_id, user_id = %user_id, error = %e, "Room join failed");
            close(&mut socket, CloseReason::from(&e)).await;
            return;
        }
    };
    let connection_id = session.registration.connection_id;
    let rooms = Arc::clone(&state.rooms);

    let end = run_session(
        &mut socket,
        &mut session.registration.receiver,
        Liveness::from_state(&state),
        |text| {
            let Some(RoomInbound::Message { message }) = parse_inbound(text) else {
                return Flow::Continue;
            };
            match rooms.post(room_id, user_id, &message) {
                Ok(_) => Flow::Continue,
                Err(e) => {
                    tracing::error!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to post room message");
                    Flow::Reply(ServerEvent::Error {
                        message: "Failed to send message".to_string(),
                    })
                }
            }
        },
    )
    .await;

    if let Err(e) = state.rooms.leave(room_id, user_id, connection_id) {
        tracing::warn!(room_id = %room_id, error = %e, "Failed to announce departure");
    }
    tracing::info!(room_id = %room_id, user_id = %user_id, end = ?end, "Room session ended");
}

// =============================================================================
// Random chat
// =============================================================================

/// Random chat socket: `GET /v1/random-chat/ws?token=<jwt>`.
///
/// Connecting enters random chat: the client is told `matched` or `waiting` right
/// away, and `matched` again when a partner arrives later.
pub async fn random_socket<S, V>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState<S, V>>>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    match authenticate_socket(&*state.jwt_validator, &query, header_token(&headers)).await {
        Ok(user) => ws.on_upgrade(move |socket| random_session(socket, state, user.user_id)),
        Err(e) => {
            tracing::debug!(error = %e, "Random chat socket auth failed");
            reject(ws, CloseReason::InvalidToken)
        }
    }
}

async fn random_session<S, V>(mut socket: WebSocket, state: Arc<GatewayState<S, V>>, user_id: UserId)
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let mut registration = state.registry.register_user_session(user_id);
    let connection_id = registration.connection_id;

    match state.random.start(user_id) {
        // A fresh match was already pushed to both members
        Ok(MatchState::Matched { fresh: true, .. }) => {}
        Ok(match_state) => {
            if let Some(event) = match_state.event() {
                send_event(&mut socket, &event).await;
            }
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to enter random chat");
            state.registry.release_user_session(user_id, connection_id);
            close(&mut socket, CloseReason::Internal).await;
            return;
        }
    }
    tracing::info!(user_id = %user_id, connection_id = %connection_id, "Random chat session started");

    let random = Arc::clone(&state.random);
    let end = run_session(
        &mut socket,
        &mut registration.receiver,
        Liveness::from_state(&state),
        |text| match parse_inbound(text) {
            Some(RandomInbound::Message { room_id, message }) => {
                match random.send_message(user_id, room_id, &message) {
                    Ok(_) => Flow::Continue,
                    Err(RealtimeError::NotPaired(_)) => Flow::Reply(ServerEvent::Error {
                        message: "No active chat partner".to_string(),
                    }),
                    Err(e) => {
                        tracing::error!(user_id = %user_id, error = %e, "Failed to send random chat message");
                        Flow::Reply(ServerEvent::Error {
                            message: "Failed to send message".to_string(),
                        })
                    }
                }
            }
            Some(RandomInbound::Disconnect) => Flow::Close,
            None => Flow::Continue,
        },
    )
    .await;

    if let Err(e) = state.random.disconnect(user_id, connection_id) {
        tracing::error!(user_id = %user_id, error = %e, "Failed to tear down random chat");
    }
    tracing::info!(user_id = %user_id, end = ?end, "Random chat session ended");
}
