//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use campus_auth::JwtValidator;
use campus_store::Store;

use crate::handlers::{commute, health, random, rooms, ws};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Rooms (authenticated)
/// - `GET /v1/rooms` - Rooms the caller may join
/// - `GET /v1/rooms/:room_id/messages` - Room history
/// - `POST /v1/rooms/:room_id/messages` - Post without a socket
/// - `GET /v1/rooms/:room_id/ws?token=` - Room chat socket
///
/// ## Random chat (authenticated)
/// - `GET /v1/random-chat/ws?token=` - Random chat socket
/// - `POST /v1/random-chat/start` - Enter random chat
/// - `GET /v1/random-chat/status` - Current state
/// - `POST /v1/random-chat/cancel` - Leave the queue
/// - `POST /v1/random-chat/disconnect` - End the current chat
/// - `GET /v1/random-chat/pairings/:pairing_id` - Whether a chat is still active
/// - `POST /v1/random-chat/messages` - Message the partner without a socket
/// - `GET /v1/random-chat/messages/:pairing_id` - Chat history
///
/// ## Commute (authenticated)
/// - `GET /v1/commute/schedules` - Active schedule
/// - `POST /v1/commute/schedules` - Replace schedule
/// - `POST /v1/commute/match` - Run the on-demand match
/// - `GET /v1/commute/groups/today` - Today's groups
/// - `GET /v1/commute/groups/:group_id` - Group details
/// - `GET /v1/commute/groups/:group_id/messages` - Group chat history
/// - `POST /v1/commute/groups/messages` - Post to a group
pub fn create_router<S, V>(state: GatewayState<S, V>) -> Router
where
    S: Store + 'static,
    V: JwtValidator + 'static,
{
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    // Sockets are long-lived and must not inherit the request timeout.
    let sockets = Router::new()
        .route("/v1/rooms/:room_id/ws", get(ws::room_socket::<S, V>))
        .route("/v1/random-chat/ws", get(ws::random_socket::<S, V>));

    let api = Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Rooms
        .route("/v1/rooms", get(rooms::list_rooms::<S, V>))
        .route(
            "/v1/rooms/:room_id/messages",
            get(rooms::room_messages::<S, V>).post(rooms::post_room_message::<S, V>),
        )
        // Random chat
        .route("/v1/random-chat/start", post(random::start::<S, V>))
        .route("/v1/random-chat/status", get(random::status::<S, V>))
        .route("/v1/random-chat/cancel", post(random::cancel::<S, V>))
        .route(
            "/v1/random-chat/disconnect",
            post(random::disconnect::<S, V>),
        )
        .route(
            "/v1/random-chat/pairings/:pairing_id",
            get(random::get_pairing::<S, V>),
        )
        .route(
            "/v1/random-chat/messages",
            post(random::send_message::<S, V>),
        )
        .route(
            "/v1/random-chat/messages/:pairing_id",
            get(random::pairing_messages::<S, V>),
        )
        // Commute
        .route(
            "/v1/commute/schedules",
            get(commute::list_schedules::<S, V>).post(commute::replace_schedules::<S, V>),
        )
        .route("/v1/commute/match", post(commute::match_now::<S, V>))
        .route(
            "/v1/commute/groups/today",
            get(commute::groups_today::<S, V>),
        )
        .route(
            "/v1/commute/groups/:group_id",
            get(commute::get_group::<S, V>),
        )
        .route(
            "/v1/commute/groups/:group_id/messages",
            get(commute::group_messages::<S, V>),
        )
        .route(
            "/v1/commute/groups/messages",
            post(commute::post_group_message::<S, V>),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(sockets)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method, Request};
    use tower::ServiceExt;

    async fn preflight(layer: CorsLayer, origin: &str) -> Option<HeaderValue> {
        let app = Router::new().route("/", get(|| async {})).layer(layer);
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header("origin", origin)
            .header("access-control-request-method", "GET")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get("access-control-allow-origin")
            .cloned()
    }

    #[tokio::test]
    async fn cors_any_origin() {
        let layer = build_cors_layer(&["*".to_string()]);
        let allowed = preflight(layer, "https://anywhere.example").await;
        assert_eq!(allowed.unwrap(), "*");
    }

    #[tokio::test]
    async fn cors_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://campus.example.edu".to_string(),
        ];
        let allowed = preflight(build_cors_layer(&origins), "https://campus.example.edu").await;
        assert_eq!(allowed.unwrap(), "https://campus.example.edu");

        let denied = preflight(build_cors_layer(&origins), "https://evil.example").await;
        assert!(denied.is_none());
    }
}
