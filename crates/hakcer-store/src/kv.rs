use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// One write inside a [`KvStore::write_batch`].
#[derive(Clone, Debug, PartialEq)]
pub enum KvWrite {
    Set { key: String, value: Value },
    Remove { key: String },
}

impl KvWrite {
    pub fn set_json<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Self, StoreError> {
        Ok(Self::Set {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
        })
    }

    pub fn remove(key: &str) -> Self {
        Self::Remove {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

/// Async key-value storage collaborator.
///
/// Values are JSON documents. Each call is atomic on its own. Writes that
/// must land together go through [`KvStore::write_batch`], which applies all
/// of them or none.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}

/// Read and deserialize a key. Missing keys yield `None`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(value)?).await
}
