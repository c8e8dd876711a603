//! Request and response bodies for the room HTTP API
//!
//! Shared by the server handlers and [`RoomClient`](crate::client::RoomClient).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::feed::Entry;

/// `GET /api/room/{room}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Entry>,
}

/// `POST /api/room/{room}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub text: String,
}

/// `{ ok, error? }` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// `GET /api/room/{room}/unlocks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlocksResponse {
    pub unlocks: BTreeMap<String, bool>,
    pub signature: String,
    pub solved: bool,
}

/// `POST /api/room/{room}/unlocks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub ok: bool,
    #[serde(default)]
    pub emitted: Vec<Entry>,
    pub solved: bool,
}

/// `POST /api/join`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub ok: bool,
    pub username: String,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub rooms: usize,
    pub timestamp: String,
}
