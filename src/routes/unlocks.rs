//! Unlock endpoints, scoped to the caller's identity

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use super::identity::resolve_identity;
use crate::presence::check_key;
use crate::server::{error_response, json_response, read_json, AppState};
use crate::types::api::{UnlockRequest, UnlockResponse, UnlocksResponse};

/// `GET /api/room/{room}/unlocks`
pub async fn handle_get_unlocks(
    state: &AppState,
    room: &str,
    req: &Request<Incoming>,
) -> Response<Full<Bytes>> {
    let who = resolve_identity(req.headers());
    let tracker = match state.tracker(room, &who).await {
        Ok(tracker) => tracker,
        Err(e) => return error_response(e),
    };

    let set = tracker.unlocks().await;
    json_response(
        StatusCode::OK,
        &UnlocksResponse {
            unlocks: set.as_map().clone(),
            signature: set.signature(),
            solved: set.is_solved(),
        },
    )
}

/// `POST /api/room/{room}/unlocks` - unlock `{ key }` and announce it once
pub async fn handle_unlock(
    state: &AppState,
    room: &str,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let who = resolve_identity(req.headers());
    let request: UnlockRequest = match read_json(req).await {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    if let Err(e) = check_key(&state.args.unlock_key_list(), &request.key) {
        return error_response(e);
    }

    let tracker = match state.tracker(room, &who).await {
        Ok(tracker) => tracker,
        Err(e) => return error_response(e),
    };

    match tracker.set_unlocked(&request.key, &who).await {
        Ok(emitted) => json_response(
            StatusCode::OK,
            &UnlockResponse {
                ok: true,
                emitted,
                solved: tracker.solved().await,
            },
        ),
        Err(e) => error_response(e),
    }
}
