//! Append-only, deduplicated realtime feed
//!
//! - [`FeedStore`]: entries for one room, snapshot + live subscription
//! - [`FeedPublisher`]: validates a submission and appends it
//! - [`FeedSubscriber`]: client-side merge of snapshot and stream into a [`FeedView`]
//! - [`RoomRegistry`]: one store per room

pub mod entry;
pub mod publisher;
pub mod registry;
pub mod store;
pub mod subscriber;
pub mod view;

use async_trait::async_trait;

use crate::types::Result;

pub use entry::{normalize_author, now_millis, Entry, UNIDENTIFIED};
pub use publisher::{validate_body, FeedPublisher, DEFAULT_MAX_BODY_CHARS};
pub use registry::{validate_room_id, RoomRegistry};
pub use store::{FeedConfig, FeedStore, FeedSubscription};
pub use subscriber::{FeedEvent, FeedEventStream, FeedSource, FeedSubscriber};
pub use view::{ConnectionStatus, FeedView, DISPLAY_LIMIT};

/// Destination for system-generated entries (unlock notices and the like)
#[async_trait]
pub trait EntrySink: Send + Sync {
    /// Add an entry at the front of the feed. Fails on a duplicate id.
    async fn emit(&self, entry: Entry) -> Result<Entry>;
}
