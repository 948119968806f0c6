use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::database::Database;
use crate::error::StoreError;
use crate::kv::{KvStore, KvWrite};

/// SQLite-backed [`KvStore`]. Values are stored as JSON text.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let keys = conn
                .prepare("SELECT key FROM kv ORDER BY key")?
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self.db.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StoreError::from)
        })?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(&value)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| upsert(conn, key, &text, &now))?;
        debug!(key, bytes = text.len(), "kv set");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| delete(conn, key))
    }

    /// One transaction; dropped without commit on the first error.
    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<(), StoreError> {
        let mut rows = Vec::with_capacity(writes.len());
        for write in writes {
            rows.push(match write {
                KvWrite::Set { key, value } => (key, Some(serde_json::to_string(&value)?)),
                KvWrite::Remove { key } => (key, None),
            });
        }
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for (key, text) in &rows {
                match text {
                    Some(text) => upsert(&tx, key, text, &now)?,
                    None => delete(&tx, key)?,
                }
            }
            tx.commit()?;
            Ok(())
        })?;
        debug!(writes = rows.len(), "kv batch committed");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM kv", [])?;
            debug!(removed, "kv cleared");
            Ok(())
        })
    }
}

fn upsert(conn: &Connection, key: &str, text: &str, now: &str) -> Result<(), StoreError> {
    let _ = conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![key, text, now],
    )?;
    Ok(())
}

fn delete(conn: &Connection, key: &str) -> Result<(), StoreError> {
    let _ = conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
    Ok(())
}
