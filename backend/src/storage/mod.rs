//! Storage layer for persisting the channel lineup.

mod json_storage;

pub use json_storage::JsonFileStorage;

use async_trait::async_trait;
use camtuner_types::Channel;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for lineup storage backends.
///
/// The lineup is always written whole, in operator order. Ephemeral probe
/// status is never persisted.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load the lineup in operator order.
    async fn load_all(&self) -> Result<Vec<Channel>>;

    /// Replace the stored lineup.
    async fn save_all(&self, channels: &[Channel]) -> Result<()>;
}
