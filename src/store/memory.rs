use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigStore, StoreError, validate_key};

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = validate_key(key)?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StoreError> {
        let key = validate_key(key)?;
        self.records
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
