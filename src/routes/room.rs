//! Room feed endpoints: snapshot, publish and the SSE stream

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::identity::resolve_identity;
use crate::feed::{Entry, FeedSubscription};
use crate::logging::{ActivityKind, RoomActivity};
use crate::server::{
    error_response, json_response, read_json, to_boxed, AppState, BoxBody, BoxError,
};
use crate::sse;
use crate::types::api::{Ack, PostsResponse, PublishRequest};

/// `GET /api/room/{room}` - current posts, newest first
pub async fn handle_snapshot(state: &AppState, room: &str) -> Response<Full<Bytes>> {
    match state.room(room) {
        Ok(store) => json_response(
            StatusCode::OK,
            &PostsResponse {
                posts: store.snapshot().await,
            },
        ),
        Err(e) => error_response(e),
    }
}

/// `POST /api/room/{room}` - publish `{ text }` as the caller's identity
pub async fn handle_publish(
    state: &AppState,
    room: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let who = resolve_identity(req.headers());

    let publisher = match state.publisher(room) {
        Ok(publisher) => publisher,
        Err(e) => return error_response(e),
    };

    let request: PublishRequest = match read_json(req).await {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    match publisher.publish(&who, &request.text).await {
        Ok(_) => json_response(StatusCode::OK, &Ack::ok()),
        Err(e) => error_response(e),
    }
}

/// `GET /api/room/{room}/stream` - `hello`, then one `post` per new entry.
///
/// With `?replay=1` the current posts are sent oldest first right after
/// `hello`, taken under the same lock as the subscription so nothing falls
/// in between.
pub async fn handle_stream(
    state: Arc<AppState>,
    room: &str,
    req: &Request<Incoming>,
) -> Response<BoxBody> {
    let store = match state.room(room) {
        Ok(store) => store,
        Err(e) => return to_boxed(error_response(e)),
    };

    let (backlog, subscription) = if wants_replay(req.uri().query()) {
        store.snapshot_and_subscribe().await
    } else {
        (Vec::new(), store.subscribe().await)
    };

    let keepalive = Duration::from_secs(state.args.stream_keepalive_secs);
    let guard = StreamGuard::open(room, &resolve_identity(req.headers()));
    let frames = event_frames(backlog, subscription, keepalive, guard)
        .map(|frame| frame.map(Frame::data));

    let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sse::CONTENT_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// `hello`, the backlog oldest first, then live posts and keep-alives.
///
/// A subscription that lagged ends the body with an error, so the client sees
/// a broken stream instead of a silent gap.
fn event_frames(
    backlog: Vec<Entry>,
    subscription: FeedSubscription,
    keepalive: Duration,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static {
    let mut head = vec![sse::hello_frame()];
    head.extend(backlog.iter().rev().map(encode_post));

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let live = stream::unfold(
        Some((subscription, ticker, guard)),
        |state| async move {
            let (mut subscription, mut ticker, guard) = state?;
            let frame = tokio::select! {
                entry = subscription.next() => match entry? {
                    Ok(entry) => encode_post(&entry),
                    Err(e) => return Some((Err(BoxError::from(e)), None)),
                },
                _ = ticker.tick() => sse::keepalive_frame(),
            };
            Some((Ok(frame), Some((subscription, ticker, guard))))
        },
    );

    stream::iter(head.into_iter().map(Ok)).chain(live)
}

fn wants_replay(query: Option<&str>) -> bool {
    query
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(name, value)| name == "replay" && matches!(value, "1" | "true"))
}

fn encode_post(entry: &Entry) -> Bytes {
    match sse::post_frame(entry) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(id = %entry.id, error = %e, "Failed to encode post frame");
            sse::keepalive_frame()
        }
    }
}

/// Logs stream open on creation and stream close when hyper drops the body
struct StreamGuard {
    room: String,
    who: String,
    opened: Instant,
}

impl StreamGuard {
    fn open(room: &str, who: &str) -> Self {
        info!(room = %room, who = %who, "Stream opened");
        RoomActivity::new(ActivityKind::StreamOpened, room)
            .with_author(who)
            .log();
        Self {
            room: room.to_string(),
            who: who.to_string(),
            opened: Instant::now(),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let duration_ms = self.opened.elapsed().as_millis();
        info!(room = %self.room, who = %self.who, duration_ms = %duration_ms, "Stream closed");
        RoomActivity::new(ActivityKind::StreamClosed, &self.room)
            .with_author(&self.who)
            .with_detail(&format!("{}ms", duration_ms))
            .log();
    }
}
