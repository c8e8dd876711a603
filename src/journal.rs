//! Local journal - the client-side variant of a room feed
//!
//! Keeps `{ activity, notes }` for one room in a [`StateStore`] instead of on
//! a server. Both lists are newest first. Activity receives system entries
//! (unlock notices); notes are the detective's own jottings.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::feed::{normalize_author, validate_body, Entry, EntrySink};
use crate::logging::{ActivityKind, RoomActivity};
use crate::persist::{self, keys, StateStore};
use crate::types::{Result, RoomError};

/// Persisted shape of a room journal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    #[serde(default)]
    pub activity: Vec<Entry>,
    #[serde(default)]
    pub notes: Vec<Entry>,
}

/// Per-room journal backed by injected persistence
pub struct LocalJournal {
    room: String,
    store: Arc<dyn StateStore>,
    record: Mutex<JournalRecord>,
    max_body_chars: usize,
}

impl LocalJournal {
    /// Load the room's journal, or start empty
    pub async fn open(room: &str, store: Arc<dyn StateStore>, max_body_chars: usize) -> Result<Self> {
        let record: JournalRecord = persist::load_as(store.as_ref(), &keys::journal(room))
            .await?
            .unwrap_or_default();

        debug!(
            room = %room,
            activity = record.activity.len(),
            notes = record.notes.len(),
            "Opened local journal"
        );

        Ok(Self {
            room: room.to_string(),
            store,
            record: Mutex::new(record),
            max_body_chars,
        })
    }

    /// Add a note, validated like a published post
    pub async fn add_note(&self, author: &str, body: &str) -> Result<Entry> {
        let body = validate_body(body, self.max_body_chars)?;
        let entry = Entry::new(normalize_author(author), body);

        let mut record = self.record.lock().await;
        let mut next = record.clone();
        next.notes.insert(0, entry.clone());
        self.persist(&next).await?;
        *record = next;

        RoomActivity::new(ActivityKind::NoteAdded, &self.room)
            .with_author(&entry.author)
            .with_entry(&entry.id)
            .log();
        Ok(entry)
    }

    /// Put an entry at the front of the activity list. Known ids are rejected
    /// with [`RoomError::DuplicateId`]. Nothing changes if the save fails.
    pub async fn record_activity(&self, entry: Entry) -> Result<Entry> {
        let mut record = self.record.lock().await;
        if record.activity.iter().any(|e| e.id == entry.id) {
            return Err(RoomError::DuplicateId(entry.id));
        }
        let mut next = record.clone();
        next.activity.insert(0, entry.clone());
        self.persist(&next).await?;
        *record = next;
        Ok(entry)
    }

    /// Activity, newest first
    pub async fn activity(&self) -> Vec<Entry> {
        self.record.lock().await.activity.clone()
    }

    /// Notes, newest first
    pub async fn notes(&self) -> Vec<Entry> {
        self.record.lock().await.notes.clone()
    }

    pub async fn record(&self) -> JournalRecord {
        self.record.lock().await.clone()
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    async fn persist(&self, record: &JournalRecord) -> Result<()> {
        persist::save_as(self.store.as_ref(), &keys::journal(&self.room), record).await
    }
}

#[async_trait]
impl EntrySink for LocalJournal {
    async fn emit(&self, entry: Entry) -> Result<Entry> {
        self.record_activity(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DEFAULT_MAX_BODY_CHARS;
    use crate::persist::{FileStateStore, MemoryStateStore};
    use crate::presence::{UnlockTracker, CASE01_KEYS};
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_notes_newest_first_and_validated() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let journal = LocalJournal::open("case01", store, DEFAULT_MAX_BODY_CHARS)
            .await
            .unwrap();

        journal.add_note("Kelly", "operator 3 lied").await.unwrap();
        journal.add_note("Kelly", "  tape ends at 02:14 ").await.unwrap();
        assert!(matches!(
            journal.add_note("Kelly", "   ").await,
            Err(RoomError::Validation(_))
        ));

        let notes = journal.notes().await;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].body, "tape ends at 02:14");
    }

    #[tokio::test]
    async fn test_activity_dedupes_by_id() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let journal = LocalJournal::open("case01", store, DEFAULT_MAX_BODY_CHARS)
            .await
            .unwrap();

        let entry = Entry::with_id("sys-1", 1, "Kelly", "Kelly unlocked REC-01");
        journal.record_activity(entry.clone()).await.unwrap();
        assert!(journal.record_activity(entry).await.unwrap_err().is_silent());
        assert_eq!(journal.activity().await.len(), 1);
    }

    #[tokio::test]
    async fn test_journal_survives_reload_with_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let keys: Vec<String> = CASE01_KEYS.iter().map(|k| k.to_string()).collect();

        {
            let store: Arc<dyn StateStore> =
                Arc::new(FileStateStore::open(dir.path()).await.unwrap());
            let journal = Arc::new(
                LocalJournal::open("case01", Arc::clone(&store), DEFAULT_MAX_BODY_CHARS)
                    .await
                    .unwrap(),
            );
            let tracker = UnlockTracker::open(
                "case01",
                None,
                &keys,
                store,
                Arc::clone(&journal) as Arc<dyn EntrySink>,
            )
            .await
            .unwrap();

            tracker.set_unlocked("REC-02", "Kelly").await.unwrap();
            journal.add_note("Kelly", "REC-02 was in the switchboard log").await.unwrap();
        }

        let store: Arc<dyn StateStore> = Arc::new(FileStateStore::open(dir.path()).await.unwrap());
        let journal = Arc::new(
            LocalJournal::open("case01", Arc::clone(&store), DEFAULT_MAX_BODY_CHARS)
                .await
                .unwrap(),
        );
        let tracker = UnlockTracker::open(
            "case01",
            None,
            &keys,
            store,
            Arc::clone(&journal) as Arc<dyn EntrySink>,
        )
        .await
        .unwrap();

        assert!(tracker.observe("Kelly").await.unwrap().is_empty());
        let record = journal.record().await;
        assert_eq!(record.activity.len(), 1);
        assert_eq!(record.notes.len(), 1);
        assert!(record.activity[0].body.contains("REC-02"));
    }

    /// Memory store whose saves can be switched off
    struct FlakyStore {
        inner: MemoryStateStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl StateStore for FlakyStore {
        async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
            self.inner.load(key).await
        }

        async fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RoomError::Storage("disk full".into()));
            }
            self.inner.save(key, value).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_changes_nothing() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStateStore::new(),
            failing: AtomicBool::new(true),
        });
        let journal = LocalJournal::open(
            "case01",
            Arc::clone(&store) as Arc<dyn StateStore>,
            DEFAULT_MAX_BODY_CHARS,
        )
        .await
        .unwrap();

        let entry = Entry::with_id("sys-1", 1, "Kelly", "Kelly unlocked REC-01");
        assert!(journal.add_note("Kelly", "lost note").await.is_err());
        assert!(journal.record_activity(entry.clone()).await.is_err());
        assert_eq!(journal.record().await, JournalRecord::default());

        store.failing.store(false, Ordering::SeqCst);
        tokio_test::assert_ok!(journal.record_activity(entry).await);
        assert_eq!(journal.activity().await.len(), 1);
    }
}
