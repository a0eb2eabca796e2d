//! Process-wide key-value store for session and configuration records.
//!
//! The cache only needs `get`/`set`/`remove` semantics from this layer: it
//! reads the application configuration record and the signed-in user record
//! out of it to derive tenant namespaces.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde_json::Value;

/// Persisted string-keyed store of structured values.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get_item(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: Value) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Keys holding the signed-in session, dropped on sign-out.
pub const SESSION_KEYS: [&str; 3] = ["access_token", "user", "last_activity"];
