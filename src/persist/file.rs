//! File-backed state store
//!
//! One JSON file per key in a directory. Writes go to a temp file first and
//! are renamed into place, so a crash never leaves a half-written record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::StateStore;
use crate::types::{Result, RoomError};

/// Directory of `<encoded key>.json` files
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Open (and create if needed) a state directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RoomError::Storage(format!("Create state dir {}: {}", dir.display(), e))
        })?;
        info!(dir = %dir.display(), "File state store ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RoomError::Storage(format!(
                    "Read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let value = serde_json::from_slice(&raw)
            .map_err(|e| RoomError::Storage(format!("Decode {}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(&value)
            .map_err(|e| RoomError::Storage(format!("Encode {}: {}", key, e)))?;

        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key = %key, path = %path.display(), "Saved state record");
        Ok(())
    }
}
