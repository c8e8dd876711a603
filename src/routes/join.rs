//! `POST /api/join` - remember a display name in a cookie

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::{Request, Response, StatusCode};
use tracing::info;

use super::identity::{validate_username, USERNAME_COOKIE};
use crate::server::{error_response, json_response, read_json};
use crate::types::api::{JoinRequest, JoinResponse};
use crate::types::RoomError;

/// Cookie lifetime in seconds (30 days)
const COOKIE_MAX_AGE: u64 = 30 * 24 * 60 * 60;

pub async fn handle_join(req: Request<Incoming>) -> Response<Full<Bytes>> {
    let request: JoinRequest = match read_json(req).await {
        Ok(request) => request,
        Err(e) => return error_response(e),
    };

    let username = match validate_username(&request.username) {
        Ok(username) => username,
        Err(e) => return error_response(e),
    };

    info!(who = %username, "Joined");

    let mut response = json_response(
        StatusCode::OK,
        &JoinResponse {
            ok: true,
            username: username.clone(),
        },
    );

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        USERNAME_COOKIE,
        urlencoding::encode(&username),
        COOKIE_MAX_AGE
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => return error_response(RoomError::Internal(format!("Cookie header: {}", e))),
    }
    response
}
