//! Room activity records
//!
//! One structured line per thing that happened in a room, emitted on the
//! `room_activity` tracing target so it can be filtered or shipped separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Activity types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Post appended to a room feed
    Published,
    /// Retrieval key unlocked
    Unlocked,
    /// SSE stream attached
    StreamOpened,
    /// SSE stream detached
    StreamClosed,
    /// Note added to a local journal
    NoteAdded,
}

/// Activity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomActivity {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    /// Free-form detail (unlocked key, stream duration, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RoomActivity {
    pub fn new(kind: ActivityKind, room: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            room: room.to_string(),
            author: None,
            entry_id: None,
            detail: None,
        }
    }

    /// Set the author
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Set the entry id
    pub fn with_entry(mut self, entry_id: &str) -> Self {
        self.entry_id = Some(entry_id.to_string());
        self
    }

    /// Set the detail
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Emit on the `room_activity` target
    pub fn log(&self) {
        match self.to_jsonl() {
            Ok(line) => info!(target: "room_activity", "{}", line),
            Err(e) => error!("Failed to serialize room activity: {}", e),
        }
    }
}
