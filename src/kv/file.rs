//! JSON-file backed key-value store.
//!
//! The whole store is a single JSON object on disk. It is read once when the
//! store is opened and rewritten on every mutation, with owner-only
//! permissions since it holds session tokens and the user record.

// Author: kelexine (https://github.com/kelexine)

use super::KeyValueStore;
use crate::error::{CacheError, Result};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileStore {
    path: PathBuf,
    items: RwLock<Map<String, Value>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = Self::load(&path)?;
        debug!("Opened key-value store at {} ({} keys)", path.display(), items.len());
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    fn load(path: &Path) -> Result<Map<String, Value>> {
        if !path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CacheError::KeyValue(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents)? {
            Value::Object(map) => Ok(map),
            other => Err(CacheError::KeyValue(format!(
                "Expected a JSON object in {}, found {}",
                path.display(),
                json_type(&other)
            ))),
        }
    }

    fn persist(&self, items: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|e| {
                CacheError::KeyValue(format!("Failed to create {}: {}", tmp.display(), e))
            })?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        #[cfg(unix)]
        {
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let mut items = self.items.write();
        let mut next = items.clone();
        next.insert(key.to_string(), value);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write();
        if !items.contains_key(key) {
            return Ok(());
        }
        let mut next = items.clone();
        next.remove(key);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
