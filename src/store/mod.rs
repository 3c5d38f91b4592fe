mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key: {0}")]
    InvalidKey(String),
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat key-value store for administrative settings.
///
/// Records are read and overwritten whole. Concurrent writers are not
/// coordinated; the last write wins.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError>;
}

pub(crate) fn validate_key(key: &str) -> Result<&str, StoreError> {
    let trimmed = key.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
