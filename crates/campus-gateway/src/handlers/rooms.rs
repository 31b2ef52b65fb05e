//! Room catalog and history endpoints.
//!
//! Live room traffic goes over the WebSocket in [`super::ws`]; these endpoints
//! list the rooms a user may join, page through what was said before, and let a
//! client without a socket post.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use campus_auth::JwtValidator;
use campus_core::RoomId;
use campus_realtime::ServerEvent;
use campus_store::{Room, RoomKind, Store};

use super::{parse_id, HistoryQuery};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// A room as listed to a client.
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    /// Room ID.
    pub room_id: RoomId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Whether joining needs an attribute grant.
    pub restricted: bool,
    /// Sessions currently in the room.
    pub online_count: usize,
    /// Socket path for joining.
    pub ws_url: String,
}

impl RoomResponse {
    fn new(room: Room, online_count: usize) -> Self {
        Self {
            ws_url: format!("/v1/rooms/{}/ws", room.room_id),
            room_id: room.room_id,
            name: room.name,
            description: room.description,
            restricted: matches!(room.kind, RoomKind::Restricted { .. }),
            online_count,
        }
    }
}

/// Response for listing rooms.
#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    /// Rooms the caller may join.
    pub rooms: Vec<RoomResponse>,
}

/// Response for a page of history.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Messages, oldest first, in the same shape as live frames.
    pub messages: Vec<ServerEvent>,
}

/// Request to post a message.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    /// Message text.
    pub message: String,
}

/// List the rooms the caller may join.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn list_rooms<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<ListRoomsResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let rooms = state
        .rooms
        .accessible_rooms(user.user_id)?
        .into_iter()
        .map(|room| {
            let online = state.rooms.online_count(room.room_id);
            RoomResponse::new(room, online)
        })
        .collect();

    Ok(Json(ListRoomsResponse { rooms }))
}

/// Recent messages of a room.
///
/// # Errors
///
/// Returns an error if the room does not exist or the caller may not join it.
pub async fn room_messages<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagesResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let room_id: RoomId = parse_id(&room_id)?;
    let limit = state.config.history_limit(query.limit);

    let messages = state
        .rooms
        .history(room_id, user.user_id, limit)?
        .iter()
        .map(ServerEvent::room_message)
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

/// Post a message to a room. Live sessions in the room receive it like any other.
///
/// # Errors
///
/// Returns `BadRequest` for blank text, or an error if the room does not exist or
/// the caller may not join it.
pub async fn post_room_message<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ServerEvent>), ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let room_id: RoomId = parse_id(&room_id)?;
    state.rooms.authorize(room_id, user.user_id)?;

    let saved = state
        .rooms
        .post(room_id, user.user_id, &request.message)?
        .ok_or_else(|| ApiError::BadRequest("message is empty".into()))?;
    Ok((StatusCode::CREATED, Json(ServerEvent::room_message(&saved))))
}
