//! Feed Publisher - turns a submission into an appended entry

use std::sync::Arc;

use tracing::info;

use super::entry::{normalize_author, Entry};
use super::store::FeedStore;
use crate::logging::{ActivityKind, RoomActivity};
use crate::types::{Result, RoomError};

/// Default body cap, in characters
pub const DEFAULT_MAX_BODY_CHARS: usize = 1200;

/// Trim a submitted body and check it against the length cap.
///
/// Length is counted in characters, not bytes.
pub fn validate_body(body: &str, max_chars: usize) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(RoomError::Validation("Message is empty.".to_string()));
    }

    let chars = trimmed.chars().count();
    if chars > max_chars {
        return Err(RoomError::Validation(format!(
            "Message too long ({} chars, max {}).",
            chars, max_chars
        )));
    }

    Ok(trimmed.to_string())
}

/// Publishes user submissions into a room's feed
#[derive(Clone)]
pub struct FeedPublisher {
    store: Arc<FeedStore>,
    max_body_chars: usize,
}

impl FeedPublisher {
    pub fn new(store: Arc<FeedStore>, max_body_chars: usize) -> Self {
        Self {
            store,
            max_body_chars,
        }
    }

    /// Validate, stamp with a fresh id and the current time, append.
    ///
    /// Subscribers get the entry through the store's fan-out; the caller gets
    /// it back directly.
    pub async fn publish(&self, author: &str, body: &str) -> Result<Entry> {
        let body = validate_body(body, self.max_body_chars)?;
        let entry = Entry::new(normalize_author(author), body);
        let entry = self.store.append(entry).await?;

        info!(room = %self.store.room(), id = %entry.id, who = %entry.author, "Published entry");
        RoomActivity::new(ActivityKind::Published, self.store.room())
            .with_author(&entry.author)
            .with_entry(&entry.id)
            .log();

        Ok(entry)
    }

    pub fn store(&self) -> &Arc<FeedStore> {
        &self.store
    }

    pub fn max_body_chars(&self) -> usize {
        self.max_body_chars
    }
}
