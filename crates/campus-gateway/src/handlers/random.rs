//! Random chat endpoints.
//!
//! The socket at `/v1/random-chat/ws` is the primary surface. These endpoints let a
//! client poll or drive the same state machine, e.g. after a reconnect, and send
//! without a socket.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use campus_auth::JwtValidator;
use campus_core::PairingId;
use campus_realtime::{MatchState, ServerEvent};
use campus_store::Store;

use super::rooms::MessagesResponse;
use super::{parse_id, HistoryQuery};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Where the caller stands in random chat.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// `idle`, `waiting` or `matched`.
    pub status: &'static str,
    /// The active pairing when matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<PairingId>,
}

impl From<&MatchState> for StatusResponse {
    fn from(state: &MatchState) -> Self {
        let status = match state {
            MatchState::Idle => "idle",
            MatchState::Waiting => "waiting",
            MatchState::Matched { .. } => "matched",
        };
        Self {
            status,
            room_id: state.pairing().map(|p| p.pairing_id),
        }
    }
}

/// Response for leaving the queue.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// Whether the caller was queued.
    pub cancelled: bool,
}

/// Response for ending a chat.
#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    /// The pairing that was ended, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<PairingId>,
    /// Whether an active pairing was ended.
    pub ended: bool,
}

/// Response for a pairing lookup.
#[derive(Debug, Serialize)]
pub struct PairingResponse {
    /// Pairing ID.
    pub room_id: PairingId,
    /// `false` once either member has left.
    pub active: bool,
}

/// Request to message the current partner.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The pairing, if the client knows it. Defaults to the active one.
    #[serde(default)]
    pub room_id: Option<PairingId>,
    /// Message text.
    pub message: String,
}

/// Enter random chat.
///
/// Only users with an open socket count as candidates, so a caller without one is
/// queued but will be skipped until it connects.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn start<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<StatusResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let match_state = state.random.start(user.user_id)?;
    Ok(Json(StatusResponse::from(&match_state)))
}

/// Current state, pairing the caller first if a live partner is waiting.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn status<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<StatusResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let match_state = state.random.reconcile(user.user_id)?;
    Ok(Json(StatusResponse::from(&match_state)))
}

/// Leave the queue.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn cancel<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<CancelResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let cancelled = state.random.cancel(user.user_id)?;
    Ok(Json(CancelResponse { cancelled }))
}

/// End the caller's chat and notify the partner.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn disconnect<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<DisconnectResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let ended = state.random.end(user.user_id)?;
    Ok(Json(DisconnectResponse {
        room_id: ended.as_ref().map(|p| p.pairing_id),
        ended: ended.is_some(),
    }))
}

/// Whether a pairing is still active.
///
/// # Errors
///
/// Returns `BadRequest` for a malformed ID, or an error if the store fails.
pub async fn get_pairing<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(pairing_id): Path<String>,
) -> Result<Json<PairingResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let pairing_id: PairingId = parse_id(&pairing_id)?;
    let active = state.random.pairing_active(user.user_id, pairing_id)?;
    Ok(Json(PairingResponse {
        room_id: pairing_id,
        active,
    }))
}

/// Messages of one of the caller's pairings, labelled from the caller's side.
///
/// # Errors
///
/// Returns `NotFound` if the caller was never a member of the pairing.
pub async fn pairing_messages<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(pairing_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagesResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let pairing_id: PairingId = parse_id(&pairing_id)?;
    let limit = state.config.history_limit(query.limit);

    let messages = state
        .random
        .history(user.user_id, pairing_id, limit)?
        .iter()
        .map(|m| ServerEvent::pairing_message(m, user.user_id))
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

/// Message the caller's partner. The reply is the caller's own copy.
///
/// # Errors
///
/// Returns `Conflict` without an active pairing, `BadRequest` for blank text, or an
/// error if the store fails.
pub async fn send_message<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ServerEvent>), ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let sent = state
        .random
        .send_message(user.user_id, request.room_id, &request.message)?
        .ok_or_else(|| ApiError::BadRequest("message is empty".into()))?;
    Ok((
        StatusCode::CREATED,
        Json(ServerEvent::pairing_message(&sent.message, user.user_id)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::UserId;
    use campus_store::RandomPairing;
    use chrono::Utc;

    #[test]
    fn status_from_match_state() {
        let idle = serde_json::to_value(StatusResponse::from(&MatchState::Idle)).unwrap();
        assert_eq!(idle, serde_json::json!({"status": "idle"}));

        let pairing = RandomPairing {
            pairing_id: PairingId::new(9),
            user_a: UserId::new(1),
            user_b: UserId::new(2),
            active: true,
            created_at: Utc::now(),
            ended_at: None,
        };
        let matched = MatchState::Matched {
            pairing,
            fresh: false,
        };
        let json = serde_json::to_value(StatusResponse::from(&matched)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "matched", "room_id": 9}));
    }
}
