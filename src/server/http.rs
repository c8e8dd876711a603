//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Routes are matched on
//! `(method, path)` and handled in [`crate::routes`].

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::feed::{
    validate_room_id, EntrySink, FeedPublisher, FeedStore, RoomRegistry, UNIDENTIFIED,
};
use crate::persist::StateStore;
use crate::presence::UnlockTracker;
use crate::routes::{self, validate_username};
use crate::types::api::Ack;
use crate::types::{Result, RoomError};

/// Body error. A streamed body that fails aborts the connection mid-response.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body for every route. Unsync so streamed bodies need only be `Send`.
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, BoxError>;

/// Largest request body accepted before JSON decoding
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// One feed store per room
    pub rooms: RoomRegistry,
    /// Unlock flags and signatures
    pub state_store: Arc<dyn StateStore>,
    /// Open unlock trackers by (room, account)
    trackers: DashMap<(String, String), Arc<UnlockTracker>>,
}

impl AppState {
    pub fn new(args: Args, state_store: Arc<dyn StateStore>) -> Self {
        let rooms = RoomRegistry::new(args.feed_config());
        Self {
            args,
            rooms,
            state_store,
            trackers: DashMap::new(),
        }
    }

    /// Open every configured room up front. Only these rooms are served.
    pub fn open_rooms(&self) -> Result<()> {
        for room in self.args.room_list() {
            self.rooms.get_or_create(&room)?;
        }
        Ok(())
    }

    /// Store for a served room
    pub fn room(&self, room: &str) -> Result<Arc<FeedStore>> {
        validate_room_id(room)?;
        self.rooms
            .get(room)
            .ok_or_else(|| RoomError::NotFound(format!("room {}", room)))
    }

    /// Publisher for a served room
    pub fn publisher(&self, room: &str) -> Result<FeedPublisher> {
        let store = self.room(room)?;
        Ok(FeedPublisher::new(store, self.args.max_body_chars))
    }

    /// Unlock tracker for `account` in `room`.
    ///
    /// A freshly opened tracker observes once so flags persisted without
    /// their entries are announced now. Past `max_trackers`, trackers nobody
    /// is using are dropped; their state is reloaded on next use.
    pub async fn tracker(&self, room: &str, account: &str) -> Result<Arc<UnlockTracker>> {
        let account = validate_username(account).unwrap_or_else(|_| UNIDENTIFIED.to_string());
        let key = (room.to_string(), account.clone());
        if let Some(tracker) = self.trackers.get(&key) {
            return Ok(Arc::clone(tracker.value()));
        }

        let store = self.room(room)?;
        if self.trackers.len() >= self.args.max_trackers {
            self.trackers.retain(|_, tracker| Arc::strong_count(tracker) > 1);
            debug!(open = self.trackers.len(), "Dropped idle unlock trackers");
        }

        let tracker = UnlockTracker::open(
            room,
            Some(&account),
            &self.args.unlock_key_list(),
            Arc::clone(&self.state_store),
            store as Arc<dyn EntrySink>,
        )
        .await?;

        let tracker = self
            .trackers
            .entry(key)
            .or_insert_with(|| Arc::new(tracker))
            .clone();
        tracker.observe(&account).await?;
        Ok(tracker)
    }

    /// Unlock trackers currently cached
    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }
}

/// Bind `args.listen` and serve until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await.map_err(|e| {
        RoomError::Config(format!("Unable to bind {}: {}", state.args.listen, e))
    })?;
    info!("scib-room listening on {}", state.args.listen);
    serve(listener, state).await
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Connection from {} ended: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    let response = match (method, segments.as_slice()) {
        (Method::GET, ["health"]) => to_boxed(routes::health_check(&state)),

        (Method::POST, ["api", "join"]) => to_boxed(routes::handle_join(req).await),

        (Method::GET, ["api", "room", room]) => {
            to_boxed(routes::handle_snapshot(&state, room).await)
        }
        (Method::POST, ["api", "room", room]) => {
            let room = room.to_string();
            to_boxed(routes::handle_publish(&state, &room, req).await)
        }
        (Method::GET, ["api", "room", room, "stream"]) => {
            let room = room.to_string();
            routes::handle_stream(Arc::clone(&state), &room, &req).await
        }
        (Method::GET, ["api", "room", room, "unlocks"]) => {
            let room = room.to_string();
            to_boxed(routes::handle_get_unlocks(&state, &room, &req).await)
        }
        (Method::POST, ["api", "room", room, "unlocks"]) => {
            let room = room.to_string();
            to_boxed(routes::handle_unlock(&state, &room, req).await)
        }

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Read and decode a JSON request body.
///
/// Oversized, unreadable and malformed bodies all become
/// [`RoomError::BadRequest`].
pub async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = Limited::new(req.into_body(), MAX_REQUEST_BYTES)
        .collect()
        .await
        .map_err(|e| RoomError::BadRequest(format!("Unreadable request body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&body)
        .map_err(|e| RoomError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Convert a Full<Bytes> body to BoxBody
pub fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed_unsync())
}

/// JSON response with CORS and no caching
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, raw) = match serde_json::to_vec(body) {
        Ok(raw) => (status, raw),
        Err(e) => {
            warn!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"ok":false,"error":"Internal error"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(raw)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// `{ ok: false, error }` with the error's status code
pub fn error_response(err: RoomError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    json_response(status, &Ack::error(message))
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "ok": false,
            "error": "Not Found",
            "path": path,
        }),
    )
}
