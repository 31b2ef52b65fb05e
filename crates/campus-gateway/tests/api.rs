//! HTTP endpoint tests against an in-process router.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use campus_auth::MockJwtValidator;
use campus_commute::CommuteConfig;
use campus_core::{Direction, UserId};
use campus_gateway::{create_router, GatewayConfig, GatewayState};
use campus_store::{
    Channel, CommuteStore, MessageStore, NewCommuteGroup, NewRoom, RocksStore, RoomKind,
    RoomStore,
};

struct Harness {
    server: TestServer,
    state: GatewayState<RocksStore, MockJwtValidator>,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let state = GatewayState::new(
        store,
        Arc::new(MockJwtValidator),
        GatewayConfig::default(),
        CommuteConfig::default(),
    );
    let server = TestServer::new(create_router(state.clone())).unwrap();
    Harness {
        server,
        state,
        _dir: dir,
    }
}

fn bearer(user: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer test-token:{user}")).unwrap()
}

fn open_room(state: &GatewayState<RocksStore, MockJwtValidator>, name: &str) -> u64 {
    state
        .store
        .create_room(NewRoom {
            name: name.to_string(),
            description: String::new(),
            kind: RoomKind::Open,
        })
        .unwrap()
        .room_id
        .get()
}

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let h = harness();

    let response = h.server.get("/v1/rooms").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");

    let response = h
        .server
        .get("/v1/rooms")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer nonsense"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn room_catalog_respects_attributes() {
    let h = harness();
    let lounge = open_room(&h.state, "Lounge");
    let seminar = h
        .state
        .store
        .create_room(NewRoom {
            name: "Databases (Kim)".to_string(),
            description: "course chat".to_string(),
            kind: RoomKind::Restricted {
                attribute: "databases|kim".to_string(),
            },
        })
        .unwrap()
        .room_id
        .get();

    let response = h.server.get("/v1/rooms").add_header(AUTHORIZATION, bearer(1)).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let rooms = body["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["room_id"], lounge);
    assert_eq!(rooms[0]["restricted"], false);
    assert_eq!(rooms[0]["ws_url"], format!("/v1/rooms/{lounge}/ws"));

    let response = h
        .server
        .get(&format!("/v1/rooms/{seminar}/messages"))
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    h.state
        .store
        .grant_attribute(UserId::new(1), "databases|kim")
        .unwrap();
    let response = h.server.get("/v1/rooms").add_header(AUTHORIZATION, bearer(1)).await;
    assert_eq!(response.json::<Value>()["rooms"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn room_history_uses_live_frame_shape() {
    let h = harness();
    let room = open_room(&h.state, "Lounge");
    let channel = Channel::Room(campus_core::RoomId::new(room));
    h.state.store.save_message(channel, UserId::new(1), "first").unwrap();
    h.state.store.save_message(channel, UserId::new(2), "second").unwrap();
    h.state.store.save_message(channel, UserId::new(1), "third").unwrap();

    let response = h
        .server
        .get(&format!("/v1/rooms/{room}/messages"))
        .add_query_param("limit", 2)
        .add_header(AUTHORIZATION, bearer(3))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "message");
    assert_eq!(messages[0]["message"], "second");
    assert_eq!(messages[0]["sender"], "Anonymous14");
    assert_eq!(messages[1]["message"], "third");
    assert!(messages[1].get("is_mine").is_none());
}

#[tokio::test]
async fn room_history_errors() {
    let h = harness();

    let response = h
        .server
        .get("/v1/rooms/999/messages")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "not_found");

    let response = h
        .server
        .get("/v1/rooms/lounge/messages")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn room_post_without_socket_reaches_live_sessions() {
    let h = harness();
    let room = open_room(&h.state, "Lounge");
    let mut live = h
        .state
        .rooms
        .join(campus_core::RoomId::new(room), UserId::new(2))
        .unwrap();
    while live.registration.receiver.try_recv().is_ok() {}

    let response = h
        .server
        .post(&format!("/v1/rooms/{room}/messages"))
        .add_header(AUTHORIZATION, bearer(1))
        .json(&json!({"message": "anyone here?"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["type"], "message");
    assert_eq!(body["message"], "anyone here?");
    assert_eq!(body["user_id"], 1);

    let frame: Value =
        serde_json::from_str(&live.registration.receiver.try_recv().unwrap()).unwrap();
    assert_eq!(frame["id"], body["id"]);

    let response = h
        .server
        .post(&format!("/v1/rooms/{room}/messages"))
        .add_header(AUTHORIZATION, bearer(1))
        .json(&json!({"message": "   "}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = h
        .server
        .post("/v1/rooms/999/messages")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&json!({"message": "hello"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn random_chat_queue_lifecycle() {
    let h = harness();

    let response = h
        .server
        .post("/v1/random-chat/start")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "waiting"}));

    let response = h
        .server
        .get("/v1/random-chat/status")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>()["status"], "waiting");

    let response = h
        .server
        .post("/v1/random-chat/cancel")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>(), json!({"cancelled": true}));

    let response = h
        .server
        .get("/v1/random-chat/status")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>(), json!({"status": "idle"}));

    let response = h
        .server
        .post("/v1/random-chat/disconnect")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>(), json!({"ended": false}));
}

#[tokio::test]
async fn random_chat_pairing_over_http() {
    let h = harness();
    // User 1 has a live socket; only live users are paired.
    let mut first = h.state.registry.register_user_session(UserId::new(1));

    let response = h
        .server
        .post("/v1/random-chat/start")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>()["status"], "waiting");

    let response = h
        .server
        .post("/v1/random-chat/start")
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    let body = response.json::<Value>();
    assert_eq!(body["status"], "matched");
    let pairing = body["room_id"].as_u64().unwrap();

    let matched: Value = serde_json::from_str(&first.receiver.try_recv().unwrap()).unwrap();
    assert_eq!(matched, json!({"type": "matched", "room_id": pairing}));

    h.state
        .random
        .send_message(UserId::new(1), None, "hello there")
        .unwrap();

    let response = h
        .server
        .get(&format!("/v1/random-chat/messages/{pairing}"))
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["sender"], "peer");
    assert_eq!(messages[0]["is_mine"], false);

    let response = h
        .server
        .get(&format!("/v1/random-chat/messages/{pairing}"))
        .add_header(AUTHORIZATION, bearer(3))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = h
        .server
        .get(&format!("/v1/random-chat/pairings/{pairing}"))
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>(), json!({"room_id": pairing, "active": true}));

    let response = h
        .server
        .post("/v1/random-chat/disconnect")
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    assert_eq!(
        response.json::<Value>(),
        json!({"room_id": pairing, "ended": true})
    );

    // Echo of user 1's own message, then the departure notice.
    let _echo = first.receiver.try_recv().unwrap();
    let left: Value = serde_json::from_str(&first.receiver.try_recv().unwrap()).unwrap();
    assert_eq!(left, json!({"type": "partner_left"}));

    let response = h
        .server
        .get(&format!("/v1/random-chat/pairings/{pairing}"))
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    assert_eq!(response.json::<Value>()["active"], false);
}

#[tokio::test]
async fn random_chat_send_over_http() {
    let h = harness();

    let response = h
        .server
        .post("/v1/random-chat/messages")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&json!({"message": "hello?"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let mut first = h.state.registry.register_user_session(UserId::new(1));
    let _second = h.state.registry.register_user_session(UserId::new(2));
    h.state.random.start(UserId::new(1)).unwrap();
    let pairing = h.state.random.start(UserId::new(2)).unwrap();
    let pairing_id = pairing.pairing().unwrap().pairing_id.get();
    while first.receiver.try_recv().is_ok() {}

    let response = h
        .server
        .post("/v1/random-chat/messages")
        .add_header(AUTHORIZATION, bearer(2))
        .json(&json!({"room_id": pairing_id, "message": "hi stranger"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["sender"], "me");
    assert_eq!(body["is_mine"], true);

    let frame: Value = serde_json::from_str(&first.receiver.try_recv().unwrap()).unwrap();
    assert_eq!(frame["message"], "hi stranger");
    assert_eq!(frame["is_mine"], false);

    let response = h
        .server
        .post("/v1/random-chat/messages")
        .add_header(AUTHORIZATION, bearer(3))
        .json(&json!({"room_id": pairing_id, "message": "let me in"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

fn weekly_schedule(time: &str) -> Value {
    let schedules: Vec<Value> = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .map(|day| {
            json!({
                "day": day,
                "direction": "arrival",
                "time": time,
                "location": "Main Gate",
            })
        })
        .collect();
    json!({ "schedules": schedules })
}

#[tokio::test]
async fn commute_schedules_replace_previous() {
    let h = harness();

    let response = h
        .server
        .post("/v1/commute/schedules")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&weekly_schedule("08:00"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["schedules"].as_array().unwrap().len(), 7);

    let single = json!({
        "schedules": [{"day": "Mon", "direction": "departure", "time": "17:30"}]
    });
    h.server
        .post("/v1/commute/schedules")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&single)
        .await
        .assert_status_ok();

    let response = h
        .server
        .get("/v1/commute/schedules")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    let body = response.json::<Value>();
    let schedules = body["schedules"].as_array().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["direction"], "departure");
    assert_eq!(schedules[0]["time"], "17:30");
    assert_eq!(schedules[0]["location"], "");
}

#[tokio::test]
async fn commute_schedule_rejects_bad_time() {
    let h = harness();
    let response = h
        .server
        .post("/v1/commute/schedules")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&weekly_schedule("25:00"))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn commute_match_now_groups_close_times() {
    let h = harness();
    for (user, time) in [(1, "08:00"), (2, "08:03"), (3, "11:00")] {
        h.server
            .post("/v1/commute/schedules")
            .add_header(AUTHORIZATION, bearer(user))
            .json(&weekly_schedule(time))
            .await
            .assert_status_ok();
    }

    let response = h
        .server
        .post("/v1/commute/match")
        .add_header(AUTHORIZATION, bearer(1))
        .await;
    response.assert_status_ok();
    let report = response.json::<Value>();
    assert_eq!(report["policy"], "on_demand");
    assert_eq!(report["groups_created"], 1);
    assert_eq!(report["members_added"], 2);

    // Matching again changes nothing.
    let response = h
        .server
        .post("/v1/commute/match")
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    assert_eq!(response.json::<Value>()["groups_created"], 0);

    let response = h
        .server
        .get("/v1/commute/groups/today")
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    let body = response.json::<Value>();
    let groups = body["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["members"], json!([1, 2]));
    assert_eq!(groups[0]["time_slot"], "08:01");
    assert_eq!(groups[0]["location"], "Main Gate");
    let group_id = groups[0]["group_id"].as_u64().unwrap();

    let response = h
        .server
        .get("/v1/commute/groups/today")
        .add_header(AUTHORIZATION, bearer(3))
        .await;
    assert_eq!(response.json::<Value>()["groups"], json!([]));

    h.server
        .get(&format!("/v1/commute/groups/{group_id}"))
        .add_header(AUTHORIZATION, bearer(1))
        .await
        .assert_status_ok();
    h.server
        .get(&format!("/v1/commute/groups/{group_id}"))
        .add_header(AUTHORIZATION, bearer(3))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .get("/v1/commute/groups/soon")
        .add_header(AUTHORIZATION, bearer(1))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commute_group_chat_is_members_only() {
    let h = harness();
    let group = h
        .state
        .store
        .group_create(NewCommuteGroup {
            match_date: chrono::Local::now().date_naive(),
            direction: Direction::Arrival,
            location: "Main Gate".to_string(),
            time_slot: "08:00".parse().unwrap(),
        })
        .unwrap();
    for user in [1, 2] {
        h.state
            .store
            .group_member_add(group.group_id, UserId::new(user))
            .unwrap();
    }
    let group_id = group.group_id.get();

    let response = h
        .server
        .post("/v1/commute/groups/messages")
        .add_header(AUTHORIZATION, bearer(1))
        .json(&json!({"group_id": group_id, "message": "running late"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["is_mine"], true);

    let response = h
        .server
        .get(&format!("/v1/commute/groups/{group_id}/messages"))
        .add_header(AUTHORIZATION, bearer(2))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "running late");
    assert_eq!(messages[0]["is_mine"], false);
    assert_eq!(messages[0]["sender"], "Anonymous7");

    let response = h
        .server
        .get(&format!("/v1/commute/groups/{group_id}/messages"))
        .add_header(AUTHORIZATION, bearer(3))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = h
        .server
        .post("/v1/commute/groups/messages")
        .add_header(AUTHORIZATION, bearer(3))
        .json(&json!({"group_id": group_id, "message": "hi all"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
