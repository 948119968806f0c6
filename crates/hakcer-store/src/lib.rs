//! Key-value persistence for rule catalogs, history and stats.
//!
//! Last write wins: several processes may share one database and no
//! cross-instance locking is attempted.

pub mod database;
pub mod error;
pub mod kv;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use database::Database;
pub use error::StoreError;
pub use kv::{get_json, set_json, KvStore, KvWrite};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
