//! In-memory state store

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::StateStore;
use crate::types::Result;

/// Process-lifetime store, the default when no state directory is configured
#[derive(Default)]
pub struct MemoryStateStore {
    values: DashMap<String, Value>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
