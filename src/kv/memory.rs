// In-memory key-value store
// Author: kelexine (https://github.com/kelexine)

use super::KeyValueStore;
use crate::error::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Non-persistent store, used by tests and embedders that keep session
/// state elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("user").unwrap(), None);

        store.set_item("user", json!({"id": 7})).unwrap();
        assert_eq!(store.get_item("user").unwrap(), Some(json!({"id": 7})));

        store.remove_item("user").unwrap();
        store.remove_item("user").unwrap();
        assert_eq!(store.get_item("user").unwrap(), None);
    }
}
