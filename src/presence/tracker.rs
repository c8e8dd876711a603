//! Unlock tracker
//!
//! Persists an [`UnlockSet`] and turns newly unlocked keys into feed entries.
//! The last signature that produced entries is persisted next to the set, and
//! entries are only emitted when the current signature differs from it. A
//! reload with unchanged flags therefore emits nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::unlock_set::{signature_keys, UnlockSet};
use crate::feed::{normalize_author, Entry, EntrySink};
use crate::logging::{ActivityKind, RoomActivity};
use crate::persist::{self, keys, StateStore};
use crate::types::{Result, RoomError};

/// Tracks one scope's unlocks: a room, optionally narrowed to one account
pub struct UnlockTracker {
    room: String,
    account: Option<String>,
    set: Mutex<UnlockSet>,
    store: Arc<dyn StateStore>,
    sink: Arc<dyn EntrySink>,
}

impl UnlockTracker {
    /// Load persisted flags for the scope, or start with everything locked.
    ///
    /// Call [`observe`](Self::observe) afterwards to catch up on flags that
    /// were saved without their entries.
    pub async fn open(
        room: &str,
        account: Option<&str>,
        unlock_keys: &[String],
        store: Arc<dyn StateStore>,
        sink: Arc<dyn EntrySink>,
    ) -> Result<Self> {
        let persisted: BTreeMap<String, bool> =
            persist::load_as(store.as_ref(), &keys::unlocks(room, account))
                .await?
                .unwrap_or_default();
        let set = UnlockSet::restore(unlock_keys.iter().cloned(), &persisted);

        debug!(room = %room, account = ?account, signature = %set.signature(), "Opened unlock tracker");

        Ok(Self {
            room: room.to_string(),
            account: account.map(str::to_string),
            set: Mutex::new(set),
            store,
            sink,
        })
    }

    /// Mark `key` unlocked and emit entries for anything new.
    ///
    /// Unlocking an already unlocked key is a no-op apart from the signature
    /// check. The flag only changes in memory once it is persisted.
    pub async fn set_unlocked(&self, key: &str, actor: &str) -> Result<Vec<Entry>> {
        let mut set = self.set.lock().await;

        let mut next = set.clone();
        if next.unlock(key)? {
            persist::save_as(self.store.as_ref(), &self.unlocks_key(), next.as_map()).await?;
            *set = next;
            info!(room = %self.room, key = %key, who = %actor, "Unlocked");
        }

        self.observe_locked(&set, actor).await
    }

    /// Compare the current signature with the recorded one and emit one entry
    /// per key unlocked since then
    pub async fn observe(&self, actor: &str) -> Result<Vec<Entry>> {
        let set = self.set.lock().await;
        self.observe_locked(&set, actor).await
    }

    async fn observe_locked(&self, set: &UnlockSet, actor: &str) -> Result<Vec<Entry>> {
        let signature = set.signature();
        let recorded: String = persist::load_as(self.store.as_ref(), &self.signature_key())
            .await?
            .unwrap_or_default();

        if signature == recorded {
            return Ok(Vec::new());
        }

        persist::save_as(self.store.as_ref(), &self.signature_key(), &signature).await?;

        let already = signature_keys(&recorded);
        let actor = normalize_author(actor);
        let mut emitted = Vec::new();

        for key in set.unlocked_keys() {
            if already.contains(key) {
                continue;
            }

            let entry = Entry::new(actor.clone(), format!("{} unlocked {}", actor, key));
            match self.sink.emit(entry).await {
                Ok(entry) => {
                    RoomActivity::new(ActivityKind::Unlocked, &self.room)
                        .with_author(&actor)
                        .with_entry(&entry.id)
                        .with_detail(key)
                        .log();
                    emitted.push(entry);
                }
                Err(e) if e.is_silent() => {
                    debug!(room = %self.room, key = %key, "Unlock entry already present");
                }
                Err(e) => {
                    warn!(room = %self.room, key = %key, error = %e, "Failed to emit unlock entry");
                }
            }
        }

        debug!(
            room = %self.room,
            from = %recorded,
            to = %signature,
            emitted = emitted.len(),
            "Presence signature changed"
        );
        Ok(emitted)
    }

    /// Copy of the current flags
    pub async fn unlocks(&self) -> UnlockSet {
        self.set.lock().await.clone()
    }

    /// All keys unlocked, computed from the flags on every call
    pub async fn solved(&self) -> bool {
        self.set.lock().await.is_solved()
    }

    /// Last signature that produced entries
    pub async fn recorded_signature(&self) -> Result<String> {
        Ok(persist::load_as(self.store.as_ref(), &self.signature_key())
            .await?
            .unwrap_or_default())
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Whether `key` belongs to this tracker's set
    pub async fn knows(&self, key: &str) -> bool {
        self.set.lock().await.contains_key(key)
    }

    fn unlocks_key(&self) -> String {
        keys::unlocks(&self.room, self.account.as_deref())
    }

    fn signature_key(&self) -> String {
        keys::signature(&self.room, self.account.as_deref())
    }
}

/// Reject keys outside `unlock_keys` before any state is touched
pub fn check_key(unlock_keys: &[String], key: &str) -> Result<()> {
    if unlock_keys.iter().any(|k| k == key) {
        Ok(())
    } else {
        Err(RoomError::UnknownKey(key.to_string()))
    }
}
