//! Commute schedule and group endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use campus_auth::JwtValidator;
use campus_commute::{GroupView, SweepReport};
use campus_core::GroupId;
use campus_realtime::ServerEvent;
use campus_store::{CommutePreference, NewCommutePreference, Store};

use super::rooms::MessagesResponse;
use super::{parse_id, HistoryQuery};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Request to replace the caller's schedule.
#[derive(Debug, Deserialize)]
pub struct ReplaceSchedulesRequest {
    /// The new preferences. An empty list clears the schedule.
    pub schedules: Vec<NewCommutePreference>,
}

/// The caller's active schedule.
#[derive(Debug, Serialize)]
pub struct SchedulesResponse {
    /// Active preferences.
    pub schedules: Vec<CommutePreference>,
}

/// Groups of the caller.
#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    /// Groups with members.
    pub groups: Vec<GroupView>,
}

/// Request to post to a group.
#[derive(Debug, Deserialize)]
pub struct GroupMessageRequest {
    /// The group.
    pub group_id: GroupId,
    /// Message text.
    pub message: String,
}

/// List the caller's active schedule.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn list_schedules<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<SchedulesResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let schedules = state.store.preferences_for_user(user.user_id)?;
    Ok(Json(SchedulesResponse { schedules }))
}

/// Replace the caller's schedule. Earlier preferences are deactivated, not deleted.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn replace_schedules<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Json(request): Json<ReplaceSchedulesRequest>,
) -> Result<Json<SchedulesResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let schedules = state
        .store
        .replace_preferences(user.user_id, &request.schedules)?;
    tracing::info!(user_id = %user.user_id, count = schedules.len(), "Commute schedule replaced");
    Ok(Json(SchedulesResponse { schedules }))
}

/// Group everyone with a preference today, using the on-demand policy.
///
/// # Errors
///
/// Returns an error if the run cannot read candidates.
pub async fn match_now<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<SweepReport>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let engine = Arc::clone(&state.commute);
    let policy = state.commute_config.on_demand;

    tracing::info!(user_id = %user.user_id, policy = policy.name, "On-demand commute match requested");
    let report = tokio::task::spawn_blocking(move || {
        engine.run(&policy, chrono::Local::now().naive_local())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("match task failed: {e}")))??;

    Ok(Json(report))
}

/// The caller's groups for today.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn groups_today<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
) -> Result<Json<GroupsResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let today = chrono::Local::now().date_naive();
    let groups = state.commute.groups_for_user(user.user_id, today)?;
    Ok(Json(GroupsResponse { groups }))
}

/// One of the caller's groups.
///
/// # Errors
///
/// Returns `NotFound` if the group does not exist or the caller is not in it.
pub async fn get_group<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<GroupView>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let group_id: GroupId = parse_id(&group_id)?;
    let group = state.commute.group_for_member(user.user_id, group_id)?;
    Ok(Json(group))
}

/// Messages of one of the caller's groups.
///
/// # Errors
///
/// Returns `NotFound` if the group does not exist or the caller is not in it.
pub async fn group_messages<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Path(group_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessagesResponse>, ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let group_id: GroupId = parse_id(&group_id)?;
    let limit = state.config.history_limit(query.limit);

    let messages = state
        .commute
        .group_messages(user.user_id, group_id, limit)?
        .iter()
        .map(|m| ServerEvent::group_message(m, user.user_id))
        .collect();

    Ok(Json(MessagesResponse { messages }))
}

/// Post to one of the caller's groups.
///
/// # Errors
///
/// Returns `NotFound` if the caller is not in the group, or `BadRequest` for blank
/// text.
pub async fn post_group_message<S, V>(
    State(state): State<Arc<GatewayState<S, V>>>,
    user: AuthUser,
    Json(request): Json<GroupMessageRequest>,
) -> Result<(StatusCode, Json<ServerEvent>), ApiError>
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let saved = state
        .commute
        .post_group_message(user.user_id, request.group_id, &request.message)?
        .ok_or_else(|| ApiError::BadRequest("message is empty".into()))?;
    Ok((
        StatusCode::CREATED,
        Json(ServerEvent::group_message(&saved, user.user_id)),
    ))
}
