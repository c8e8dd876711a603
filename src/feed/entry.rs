//! Feed entry
//!
//! One post, activity line or note. Wire field names (`ts`, `who`, `text`)
//! match what the investigation-room page already consumes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author used when no identity is known
pub const UNIDENTIFIED: &str = "UNIDENTIFIED";

/// An immutable feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique within a room
    pub id: String,
    /// Epoch milliseconds
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "who")]
    pub author: String,
    #[serde(rename = "text")]
    pub body: String,
}

impl Entry {
    /// Build an entry with a fresh id and the current time
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            author: author.into(),
            body: body.into(),
        }
    }

    /// Build an entry with explicit id and timestamp (replays, tests)
    pub fn with_id(
        id: impl Into<String>,
        timestamp: i64,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            author: author.into(),
            body: body.into(),
        }
    }
}

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Normalize a display identity, falling back to [`UNIDENTIFIED`]
pub fn normalize_author(author: &str) -> String {
    let trimmed = author.trim();
    if trimmed.is_empty() {
        UNIDENTIFIED.to_string()
    } else {
        trimmed.to_string()
    }
}
