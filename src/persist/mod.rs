//! Keyed state persistence
//!
//! The local-journal and unlock-tracker state lives behind [`StateStore`], a
//! pair of read/write hooks over JSON values. Swap the memory store for the
//! file store (or anything else) without touching the consumers.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Result, RoomError};

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

/// Stable namespace for every persisted key
pub const NAMESPACE: &str = "scib";

/// Read/write hooks for persisted client state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Value under `key`, if any
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value under `key`
    async fn save(&self, key: &str, value: Value) -> Result<()>;
}

/// Load and decode a typed record. Undecodable records read as absent.
pub async fn load_as<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.load(key).await? {
        Some(value) => match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Ignoring unreadable persisted record");
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

/// Encode and save a typed record
pub async fn save_as<T: Serialize + Sync>(store: &dyn StateStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| RoomError::Storage(format!("Encode {}: {}", key, e)))?;
    store.save(key, value).await
}

/// Storage keys, all scoped per room
pub mod keys {
    use super::NAMESPACE;

    /// `{ activity, notes }` journal for a room
    pub fn journal(room: &str) -> String {
        format!("{}:{}:log", NAMESPACE, room)
    }

    /// Unlock flags for a room, optionally per account
    pub fn unlocks(room: &str, account: Option<&str>) -> String {
        scoped(room, "unlocks", account)
    }

    /// Last emitted presence signature for a room, optionally per account
    pub fn signature(room: &str, account: Option<&str>) -> String {
        scoped(room, "unlock-sig", account)
    }

    fn scoped(room: &str, name: &str, account: Option<&str>) -> String {
        match account {
            Some(account) => format!("{}:{}:{}:{}", NAMESPACE, room, name, account),
            None => format!("{}:{}:{}", NAMESPACE, room, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_room_scoped() {
        assert_eq!(keys::journal("case01"), "scib:case01:log");
        assert_eq!(keys::unlocks("case01", None), "scib:case01:unlocks");
        assert_eq!(
            keys::signature("case01", Some("Kelly")),
            "scib:case01:unlock-sig:Kelly"
        );
        assert_ne!(keys::unlocks("case01", None), keys::unlocks("case02", None));
    }

    #[tokio::test]
    async fn test_unreadable_record_reads_as_absent() {
        let store = MemoryStateStore::new();
        store
            .save("scib:case01:unlocks", serde_json::json!("not a map"))
            .await
            .unwrap();

        let loaded: Option<std::collections::BTreeMap<String, bool>> =
            load_as(&store, "scib:case01:unlocks").await.unwrap();
        assert!(loaded.is_none());
    }
}
