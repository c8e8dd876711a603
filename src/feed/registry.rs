//! Room registry - one feed store per room, created on first use

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::store::{FeedConfig, FeedStore};
use crate::types::{Result, RoomError};

/// Longest accepted room id
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Check a room id: 1-64 chars of `[A-Za-z0-9_-]`
pub fn validate_room_id(room: &str) -> Result<()> {
    if room.is_empty() || room.len() > MAX_ROOM_ID_LEN {
        return Err(RoomError::BadRequest(format!(
            "Room id must be 1-{} characters",
            MAX_ROOM_ID_LEN
        )));
    }
    if !room
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RoomError::BadRequest(format!("Invalid room id: {}", room)));
    }
    Ok(())
}

/// All rooms served by this process
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<FeedStore>>,
    config: FeedConfig,
}

impl RoomRegistry {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Get a room's store, creating it if needed
    pub fn get_or_create(&self, room: &str) -> Result<Arc<FeedStore>> {
        validate_room_id(room)?;

        if let Some(store) = self.rooms.get(room) {
            return Ok(Arc::clone(store.value()));
        }

        let store = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| {
                info!(room = %room, "Opened room feed");
                Arc::new(FeedStore::new(room, self.config.clone()))
            })
            .clone();
        Ok(store)
    }

    /// Get an existing room's store
    pub fn get(&self, room: &str) -> Option<Arc<FeedStore>> {
        self.rooms.get(room).map(|store| Arc::clone(store.value()))
    }

    /// Ids of every open room, sorted
    pub fn room_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
