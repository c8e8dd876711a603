//! Feed Store - append-only entries for one room
//!
//! Entries are kept in append order; `snapshot()` reverses them for display.
//! Every mutation goes through `append`, which holds the store lock across the
//! duplicate check, the insert and the broadcast send. That makes id
//! uniqueness, ordering and fan-out one atomic step.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, trace, warn};

use super::entry::Entry;
use super::EntrySink;
use crate::types::{Result, RoomError};

/// Feed store configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Entries kept in memory; oldest are evicted past this. 0 keeps everything.
    pub max_entries: usize,
    /// Broadcast buffer per store; a subscriber further behind than this lags
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_entries: 0,
            channel_capacity: 256,
        }
    }
}

#[derive(Default)]
struct FeedState {
    /// Append order, oldest first
    entries: VecDeque<Entry>,
    /// Every id ever appended, evicted ones included
    ids: HashSet<String>,
}

/// Append-only, deduplicated feed for a single room
pub struct FeedStore {
    room: String,
    config: FeedConfig,
    state: Mutex<FeedState>,
    tx: broadcast::Sender<Entry>,
}

impl FeedStore {
    /// Create an empty store for `room`
    pub fn new(room: impl Into<String>, config: FeedConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            room: room.into(),
            config,
            state: Mutex::new(FeedState::default()),
            tx,
        }
    }

    /// Room this store belongs to
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Append an entry, announcing it to every open subscription.
    ///
    /// Fails with [`RoomError::DuplicateId`] and leaves the store untouched if
    /// the id was seen before.
    pub async fn append(&self, entry: Entry) -> Result<Entry> {
        let mut state = self.state.lock().await;

        if state.ids.contains(&entry.id) {
            debug!(room = %self.room, id = %entry.id, "Rejected duplicate entry");
            return Err(RoomError::DuplicateId(entry.id));
        }

        state.ids.insert(entry.id.clone());
        state.entries.push_back(entry.clone());

        while self.config.max_entries > 0 && state.entries.len() > self.config.max_entries {
            if let Some(evicted) = state.entries.pop_front() {
                trace!(room = %self.room, id = %evicted.id, "Evicted oldest entry");
            }
        }

        // No receivers is fine
        let _ = self.tx.send(entry.clone());
        trace!(room = %self.room, id = %entry.id, "Appended entry");

        Ok(entry)
    }

    /// Point-in-time copy of the feed, newest first
    pub async fn snapshot(&self) -> Vec<Entry> {
        let state = self.state.lock().await;
        state.entries.iter().rev().cloned().collect()
    }

    /// Receive entries appended from now on. Nothing already in the feed is replayed.
    pub async fn subscribe(&self) -> FeedSubscription {
        let _state = self.state.lock().await;
        FeedSubscription::new(self.room.clone(), self.tx.subscribe())
    }

    /// Snapshot and subscription taken under the same lock, so no append
    /// falls between them
    pub async fn snapshot_and_subscribe(&self) -> (Vec<Entry>, FeedSubscription) {
        let state = self.state.lock().await;
        let snapshot = state.entries.iter().rev().cloned().collect();
        let subscription = FeedSubscription::new(self.room.clone(), self.tx.subscribe());
        (snapshot, subscription)
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an id has ever been appended
    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.ids.contains(id)
    }

    /// Open subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EntrySink for FeedStore {
    async fn emit(&self, entry: Entry) -> Result<Entry> {
        self.append(entry).await
    }
}

/// Live channel of entries appended after it was opened
pub struct FeedSubscription {
    room: String,
    rx: Option<broadcast::Receiver<Entry>>,
}

impl FeedSubscription {
    fn new(room: String, rx: broadcast::Receiver<Entry>) -> Self {
        Self { room, rx: Some(rx) }
    }

    /// Next appended entry, or `None` once closed.
    ///
    /// A subscriber that falls behind the broadcast buffer gets one
    /// [`RoomError::Lagged`] and is closed; it never sees a feed with holes.
    pub async fn next(&mut self) -> Option<Result<Entry>> {
        let received = self.rx.as_mut()?.recv().await;
        match received {
            Ok(entry) => Some(Ok(entry)),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(room = %self.room, skipped = n, "Feed subscriber lagged, closing");
                self.rx = None;
                Some(Err(RoomError::Lagged(n)))
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(room = %self.room, "Feed closed, ending subscription");
                self.rx = None;
                None
            }
        }
    }

    /// Stop receiving. Safe to call more than once.
    pub fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(room = %self.room, "Feed subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    /// Turn the subscription into a stream that ends when it closes
    pub fn into_stream(self) -> impl Stream<Item = Result<Entry>> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let entry = sub.next().await?;
            Some((entry, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn entry(id: &str, ts: i64) -> Entry {
        Entry::with_id(id, ts, "Kelly", format!("finding {}", id))
    }

    #[tokio::test]
    async fn test_snapshot_is_newest_first() {
        let store = FeedStore::new("case01", FeedConfig::default());
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store.append(entry(id, i as i64)).await.unwrap();
        }

        let ids: Vec<_> = store.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = FeedStore::new("case01", FeedConfig::default());
        store.append(entry("a", 1)).await.unwrap();

        let err = store.append(entry("a", 2)).await.unwrap_err();
        assert!(matches!(err, RoomError::DuplicateId(ref id) if id == "a"));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot().await[0].timestamp, 1);
    }

    #[tokio::test]
    async fn test_subscribe_does_not_replay() {
        let store = FeedStore::new("case01", FeedConfig::default());
        store.append(entry("before", 1)).await.unwrap();

        let mut sub = store.subscribe().await;
        store.append(entry("after", 2)).await.unwrap();

        let got = timeout(Duration::from_millis(100), sub.next())
            .await
            .expect("timeout")
            .expect("closed")
            .unwrap();
        assert_eq!(got.id, "after");
    }

    #[tokio::test]
    async fn test_subscribers_see_append_order() {
        let store = FeedStore::new("case01", FeedConfig::default());
        let mut first = store.subscribe().await;
        let mut second = store.subscribe().await;

        for (i, id) in ["x", "y", "z"].iter().enumerate() {
            store.append(entry(id, i as i64)).await.unwrap();
        }

        for sub in [&mut first, &mut second] {
            let mut seen = Vec::new();
            for _ in 0..3 {
                seen.push(sub.next().await.unwrap().unwrap().id);
            }
            assert_eq!(seen, vec!["x", "y", "z"]);
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_isolated() {
        let store = FeedStore::new("case01", FeedConfig::default());
        let mut closed = store.subscribe().await;
        let mut open = store.subscribe().await;
        assert_eq!(store.subscriber_count(), 2);

        closed.close();
        closed.close();
        assert!(closed.is_closed());
        assert!(closed.next().await.is_none());
        assert_eq!(store.subscriber_count(), 1);

        store.append(entry("a", 1)).await.unwrap();
        assert_eq!(open.next().await.unwrap().unwrap().id, "a");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_appends_single_winner() {
        let store = Arc::new(FeedStore::new("case01", FeedConfig::default()));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append(entry("same", 1)).await.is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_eviction_keeps_ids_reserved() {
        let store = FeedStore::new(
            "case01",
            FeedConfig {
                max_entries: 2,
                channel_capacity: 8,
            },
        );
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store.append(entry(id, i as i64)).await.unwrap();
        }

        let ids: Vec<_> = store.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert!(store.append(entry("a", 9)).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_and_subscribe_has_no_gap() {
        let store = FeedStore::new("case01", FeedConfig::default());
        store.append(entry("a", 1)).await.unwrap();

        let (snapshot, sub) = store.snapshot_and_subscribe().await;
        store.append(entry("b", 2)).await.unwrap();
        drop(store);

        assert_eq!(snapshot.len(), 1);
        let streamed: Vec<_> = sub.into_stream().map(|e| e.unwrap().id).collect().await;
        assert_eq!(streamed, vec!["b"]);
    }

    #[tokio::test]
    async fn test_default_keeps_every_entry() {
        let store = FeedStore::new("case01", FeedConfig::default());
        for i in 0..600 {
            store.append(entry(&format!("e{}", i), i)).await.unwrap();
        }

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 600);
        assert_eq!(snapshot[0].id, "e599");
        assert_eq!(snapshot[599].id, "e0");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_closed_not_skipped() {
        let store = FeedStore::new(
            "case01",
            FeedConfig {
                max_entries: 0,
                channel_capacity: 4,
            },
        );
        let mut sub = store.subscribe().await;
        for i in 0..20 {
            store.append(entry(&format!("e{}", i), i)).await.unwrap();
        }

        let lagged = sub.next().await.expect("lag reported");
        assert!(matches!(lagged, Err(RoomError::Lagged(_))));
        assert!(sub.is_closed());
        assert!(sub.next().await.is_none());
        assert_eq!(store.subscriber_count(), 0);
    }
}
