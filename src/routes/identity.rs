//! Display identity
//!
//! Not authentication. The name only labels posts and scopes unlock state.

use hyper::header::{self, HeaderMap};

use crate::client::USER_HEADER;
use crate::feed::UNIDENTIFIED;
use crate::types::{Result, RoomError};

/// Cookie set by `POST /api/join`
pub const USERNAME_COOKIE: &str = "scib_username";

/// Longest accepted display name, in characters
pub const MAX_USERNAME_CHARS: usize = 40;

/// Trim a display name and check it against the length cap
pub fn validate_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(RoomError::Validation("Username is empty.".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(RoomError::Validation(format!(
            "Username too long (max {}).",
            MAX_USERNAME_CHARS
        )));
    }
    Ok(username.to_string())
}

/// `X-Scib-User` header, then the `scib_username` cookie, then `UNIDENTIFIED`.
///
/// A name that would be rejected by `/api/join` counts as absent.
pub fn resolve_identity(headers: &HeaderMap) -> String {
    header_identity(headers)
        .or_else(|| cookie_identity(headers))
        .unwrap_or_else(|| UNIDENTIFIED.to_string())
}

fn header_identity(headers: &HeaderMap) -> Option<String> {
    validate_username(headers.get(USER_HEADER)?.to_str().ok()?).ok()
}

fn cookie_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == USERNAME_COOKIE)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .and_then(|value| validate_username(&value).ok())
}
