//! JSON file-based storage implementation.

use super::{Result, Storage};
use async_trait::async_trait;
use camtuner_types::Channel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// JSON file storage format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageFormat {
    version: u32,
    channels: Vec<Channel>,
}

/// Storage backend that persists the lineup to a JSON file.
pub struct JsonFileStorage {
    path: PathBuf,
    /// Serializes writers so two saves never share the temp file
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Create a new JSON file storage.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn load_all(&self) -> Result<Vec<Channel>> {
        debug!("Loading channels from {:?}", self.path);

        if !self.path.exists() {
            info!("Storage file does not exist, starting with an empty lineup");
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).await?;
        if contents.trim().is_empty() {
            info!("Storage file is empty, starting with an empty lineup");
            return Ok(Vec::new());
        }

        let storage: StorageFormat = serde_json::from_str(&contents)?;
        info!("Loaded {} channels from storage", storage.channels.len());
        Ok(storage.channels)
    }

    async fn save_all(&self, channels: &[Channel]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        debug!("Writing {} channels to {:?}", channels.len(), self.path);

        let storage = StorageFormat {
            version: 1,
            channels: channels.iter().map(Channel::without_status).collect(),
        };
        let json = serde_json::to_string_pretty(&storage)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write to temporary file first, then rename (atomic operation)
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &self.path).await?;

        info!("Saved {} channels to storage", channels.len());
        Ok(())
    }
}
