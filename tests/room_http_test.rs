//! HTTP end-to-end tests
//!
//! Each test starts a server on an ephemeral port and drives it with
//! `RoomClient` or plain reqwest.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use scib_room::client::RoomClient;
use scib_room::feed::{ConnectionStatus, FeedEvent, FeedSubscriber, UNIDENTIFIED};
use scib_room::persist::{FileStateStore, MemoryStateStore, StateStore};
use scib_room::sse::{SseDecoder, SseMessage};
use scib_room::{serve, AppState, Args, RoomError};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(state_dir: Option<&Path>) -> (String, Arc<AppState>) {
    let args = Args::parse_from(["scib-room", "--stream-keepalive-secs", "1"]);
    let store: Arc<dyn StateStore> = match state_dir {
        Some(dir) => Arc::new(FileStateStore::open(dir).await.unwrap()),
        None => Arc::new(MemoryStateStore::new()),
    };

    let state = Arc::new(AppState::new(args, store));
    state.open_rooms().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&state)));

    (format!("http://{}", addr), state)
}

fn client(base: &str, user: &str) -> RoomClient {
    RoomClient::new(base, "case01").unwrap().with_user(user)
}

// =============================================================================
// Snapshot & publish
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (base, _state) = start_server(None).await;

    let body: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["healthy"], true);
    assert_eq!(body["rooms"], 1);
}

#[tokio::test]
async fn test_publish_then_snapshot_lists_it_first() {
    let (base, _state) = start_server(None).await;
    let kelly = client(&base, "Kelly");

    kelly.publish("first note").await.unwrap();
    let before = chrono::Utc::now().timestamp_millis();
    kelly.publish("check E-06").await.unwrap();

    let posts = kelly.snapshot().await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].body, "check E-06");
    assert_eq!(posts[0].author, "Kelly");
    assert!(!posts[0].id.is_empty());
    assert!(posts[0].timestamp >= before);
    assert_eq!(posts[1].body, "first note");
}

#[tokio::test]
async fn test_validation_errors_are_inline() {
    let (base, _state) = start_server(None).await;
    let kelly = client(&base, "Kelly");

    match kelly.publish("   ").await {
        Err(RoomError::Validation(message)) => assert_eq!(message, "Message is empty."),
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(matches!(
        kelly.publish(&"x".repeat(1201)).await,
        Err(RoomError::Validation(_))
    ));
    kelly.publish(&"x".repeat(1200)).await.unwrap();

    assert_eq!(kelly.snapshot().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_anonymous_author_and_malformed_body() {
    let (base, _state) = start_server(None).await;

    let anonymous = RoomClient::new(&base, "case01").unwrap();
    anonymous.publish("who am I").await.unwrap();
    assert_eq!(anonymous.snapshot().await.unwrap()[0].author, UNIDENTIFIED);

    let response = reqwest::Client::new()
        .post(format!("{}/api/room/case01", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_and_bad_room() {
    let (base, _state) = start_server(None).await;
    let http = reqwest::Client::new();

    let missing = http.get(format!("{}/nope", base)).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let bad_room = http
        .get(format!("{}/api/room/bad%20room", base))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_room.status(), 400);

    let unserved = http
        .get(format!("{}/api/room/case99/stream", base))
        .send()
        .await
        .unwrap();
    assert_eq!(unserved.status(), 404);

    let other = RoomClient::new(&base, "case99").unwrap();
    assert!(matches!(other.snapshot().await, Err(RoomError::NotFound(_))));
    assert!(matches!(other.publish("hello").await, Err(RoomError::NotFound(_))));
}

#[tokio::test]
async fn test_overlong_header_identity_with_file_state() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _state) = start_server(Some(dir.path())).await;
    let long = client(&base, &"k".repeat(300));

    let state = long.unlocks().await.unwrap();
    assert_eq!(state.signature, "");

    let emitted = long.unlock("REC-01").await.unwrap().emitted;
    assert_eq!(emitted[0].author, UNIDENTIFIED);

    long.publish("who wrote this").await.unwrap();
    assert_eq!(long.snapshot().await.unwrap()[0].author, UNIDENTIFIED);
}

// =============================================================================
// Identity
// =============================================================================

#[tokio::test]
async fn test_join_cookie_sets_author() {
    let (base, _state) = start_server(None).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/api/join", base))
        .json(&serde_json::json!({ "username": "  Reyes " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let cookie = response
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("scib_username=Reyes"));
    assert!(cookie.contains("HttpOnly"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "Reyes");

    http.post(format!("{}/api/room/case01", base))
        .header("cookie", "scib_username=Reyes")
        .json(&serde_json::json!({ "text": "cookie post" }))
        .send()
        .await
        .unwrap();

    let posts = client(&base, "Kelly").snapshot().await.unwrap();
    assert_eq!(posts[0].author, "Reyes");
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_subscriber_follows_remote_room() {
    let (base, state) = start_server(None).await;
    let kelly = client(&base, "Kelly");
    kelly.publish("before subscribe").await.unwrap();

    let subscriber = Arc::new(FeedSubscriber::new(client(&base, "Reyes")));
    let mut status = subscriber.status();
    let runner = {
        let subscriber = Arc::clone(&subscriber);
        tokio::spawn(async move { subscriber.run(|_| {}).await })
    };

    timeout(WAIT, status.wait_for(|s| *s == ConnectionStatus::Live))
        .await
        .expect("stream never went live")
        .unwrap();

    let store = state.rooms.get("case01").unwrap();
    assert_eq!(store.subscriber_count(), 1);

    kelly.publish("after subscribe").await.unwrap();

    timeout(WAIT, async {
        while subscriber.view().read().await.len() < 2 {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("post never arrived");

    {
        let view = subscriber.view();
        let view = view.read().await;
        assert_eq!(view.entries()[0].body, "after subscribe");
        assert_eq!(view.entries()[1].body, "before subscribe");
    }

    subscriber.close();
    let final_status = timeout(WAIT, runner).await.unwrap().unwrap();
    assert_eq!(final_status, ConnectionStatus::Closed);
}

#[tokio::test]
async fn test_raw_stream_hello_replay_and_keepalive() {
    let (base, _state) = start_server(None).await;
    client(&base, "Kelly").publish("already here").await.unwrap();

    let mut response = reqwest::Client::new()
        .get(format!("{}/api/room/case01/stream?replay=1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut decoder = SseDecoder::new();
    let mut raw = String::new();
    let mut events = Vec::new();

    timeout(WAIT, async {
        while !(events.len() >= 2 && raw.contains(": keepalive")) {
            let chunk = response.chunk().await.unwrap().expect("stream ended");
            raw.push_str(&String::from_utf8_lossy(&chunk));
            events.extend(
                decoder
                    .push(&chunk)
                    .into_iter()
                    .filter_map(SseMessage::into_feed_event),
            );
        }
    })
    .await
    .expect("missing hello, replay or keepalive");

    assert_eq!(events[0], FeedEvent::Hello);
    match &events[1] {
        FeedEvent::Post(entry) => assert_eq!(entry.body, "already here"),
        other => panic!("expected replayed post, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_lost() {
    let subscriber = FeedSubscriber::new(RoomClient::new("http://127.0.0.1:9", "case01").unwrap());
    let status = timeout(WAIT, subscriber.run(|_| {})).await.unwrap();

    assert!(status.is_lost());
    assert!(status.message().unwrap().contains("Refresh to reconnect"));
}
