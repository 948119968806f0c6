use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use hakcer_store::{KvStore, KvWrite, MemoryStore, StoreError};
use parking_lot::Mutex;
use serde_json::Value;

/// In-memory store whose writes to chosen keys fail.
///
/// A batch touching a failing key is rejected whole, like a rolled back
/// transaction.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_to(&self, key: &str) {
        let _ = self.failing.lock().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self.failing.lock().contains(key) {
            return Err(StoreError::Database(format!("write to {key} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.remove(key).await
    }

    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<(), StoreError> {
        for write in &writes {
            self.check(write.key())?;
        }
        self.inner.write_batch(writes).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}
