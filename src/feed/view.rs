//! Client-side view of a feed
//!
//! Holds what a subscriber has seen so far, newest first. Incoming entries
//! are merged by id: a known id is dropped, a new one goes to the front.
//! Arrival order wins over timestamps, so entries delivered out of order stay
//! out of order.

use std::collections::HashSet;

use super::entry::Entry;

/// Entries the thread shows at once
pub const DISPLAY_LIMIT: usize = 50;

/// Locally held feed, newest first
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    entries: Vec<Entry>,
    ids: HashSet<String>,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a newest-first snapshot. Duplicate ids inside the snapshot
    /// keep their first (newest) occurrence.
    pub fn from_snapshot(snapshot: Vec<Entry>) -> Self {
        let mut view = Self::new();
        for entry in snapshot {
            if view.ids.insert(entry.id.clone()) {
                view.entries.push(entry);
            }
        }
        view
    }

    /// Merge one incoming entry. Returns `false` if the id was already known.
    pub fn merge(&mut self, entry: Entry) -> bool {
        if !self.ids.insert(entry.id.clone()) {
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    /// All entries, newest first
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The newest `limit` entries
    pub fn recent(&self, limit: usize) -> &[Entry] {
        &self.entries[..self.entries.len().min(limit)]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Whether `entry` was written by `identity` (own posts render on the right)
    pub fn is_own(entry: &Entry, identity: &str) -> bool {
        entry.author == identity
    }
}

/// Stream health as shown next to the thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Snapshot requested, stream not yet confirmed
    Connecting,
    /// Stream said hello
    Live,
    /// Stream ended on its own or was closed by the caller
    Closed,
    /// Snapshot or stream failed. Stays until the caller reconnects.
    Lost(String),
}

impl ConnectionStatus {
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Lost(_))
    }

    /// Status line for display, if any
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Lost(reason) => Some(format!(
                "Realtime connection lost ({}). Refresh to reconnect.",
                reason
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, ts: i64) -> Entry {
        Entry::with_id(id, ts, "Kelly", "note")
    }

    #[test]
    fn test_redelivery_keeps_one_copy() {
        let mut view = FeedView::from_snapshot(vec![entry("b", 2), entry("a", 1)]);

        assert!(view.merge(entry("c", 3)));
        assert!(!view.merge(entry("c", 3)));
        assert!(!view.merge(entry("a", 1)));

        let ids: Vec<_> = view.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_out_of_order_not_resorted() {
        let mut view = FeedView::new();
        view.merge(entry("late", 10));
        view.merge(entry("early", 5));

        assert_eq!(view.entries()[0].id, "early");
        assert_eq!(view.entries()[1].id, "late");
    }

    #[test]
    fn test_snapshot_duplicates_collapsed() {
        let view = FeedView::from_snapshot(vec![entry("a", 2), entry("a", 1)]);
        assert_eq!(view.len(), 1);
        assert_eq!(view.entries()[0].timestamp, 2);
    }

    #[test]
    fn test_recent_caps() {
        let mut view = FeedView::new();
        for i in 0..(DISPLAY_LIMIT + 5) {
            view.merge(entry(&format!("e{}", i), i as i64));
        }
        assert_eq!(view.recent(DISPLAY_LIMIT).len(), DISPLAY_LIMIT);
        assert_eq!(view.recent(DISPLAY_LIMIT)[0].id, format!("e{}", DISPLAY_LIMIT + 4));
        assert_eq!(FeedView::new().recent(DISPLAY_LIMIT).len(), 0);
    }

    #[test]
    fn test_lost_status_message() {
        assert!(ConnectionStatus::Live.message().is_none());
        let lost = ConnectionStatus::Lost("reset".into());
        assert!(lost.is_lost());
        assert!(lost.message().unwrap().contains("Refresh"));
    }
}
