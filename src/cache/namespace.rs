//! Per-user key namespacing.
//!
//! Every cache key is prefixed with values taken from the signed-in user
//! record, so entries written for one user are invisible to another user of
//! the same store. Which fields are used comes from the application
//! configuration record (`cache_user_fields`), falling back to `["id"]`.

// Author: kelexine (https://github.com/kelexine)

use crate::error::{CacheError, Result};
use crate::kv::KeyValueStore;
use crate::utils::logging::mask_prefix;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry of the configuration record naming the identity fields.
pub const USER_FIELDS_ENTRY: &str = "cache_user_fields";

/// Ordered, validated list of identity field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFields(Vec<String>);

impl NamespaceFields {
    /// Validates `fields`: at least one name, no blank names, no duplicates.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(CacheError::NamespaceResolutionFailed(
                "at least one identity field is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.trim().is_empty() {
                return Err(CacheError::NamespaceResolutionFailed(
                    "identity field names must not be blank".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(CacheError::NamespaceResolutionFailed(format!(
                    "duplicate identity field '{}'",
                    field
                )));
            }
        }

        Ok(Self(fields))
    }

    /// Parses the configured field list out of a JSON array of strings.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            CacheError::NamespaceResolutionFailed(format!(
                "{} must be an array of strings",
                USER_FIELDS_ENTRY
            ))
        })?;

        let names = items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CacheError::NamespaceResolutionFailed(format!(
                        "{} entries must be strings, found {}",
                        USER_FIELDS_ENTRY, item
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(names)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Builds the key prefix for `identity`.
    ///
    /// Absent and null fields are skipped. The remaining values are joined
    /// with `_` and followed by a trailing `_`; if nothing remains the
    /// prefix is empty.
    pub fn prefix_for(&self, identity: &serde_json::Map<String, Value>) -> String {
        let joined = self
            .0
            .iter()
            .filter_map(|field| identity.get(field))
            .filter_map(field_text)
            .collect::<Vec<_>>()
            .join("_");

        if joined.is_empty() {
            String::new()
        } else {
            format!("{}_", joined)
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        composite => Some(composite.to_string()),
    }
}

/// Derives the current key prefix from the key-value store.
#[derive(Clone)]
pub struct NamespaceResolver {
    store: Arc<dyn KeyValueStore>,
    config_key: String,
    identity_key: String,
    default_fields: NamespaceFields,
}

impl NamespaceResolver {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config_key: impl Into<String>,
        identity_key: impl Into<String>,
        default_fields: NamespaceFields,
    ) -> Self {
        Self {
            store,
            config_key: config_key.into(),
            identity_key: identity_key.into(),
            default_fields,
        }
    }

    /// Resolves the prefix, falling back to the shared namespace on any
    /// failure.
    pub fn current_prefix(&self) -> String {
        match self.resolve() {
            Ok(prefix) => prefix,
            Err(e) => {
                warn!("Falling back to shared cache namespace: {}", e);
                crate::metrics::record_namespace_fallback();
                String::new()
            }
        }
    }

    /// Resolves the prefix, reporting why resolution failed.
    pub fn resolve(&self) -> Result<String> {
        let fields = self.fields()?;

        let identity = match self.read(&self.identity_key)? {
            None => return Ok(String::new()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(CacheError::NamespaceResolutionFailed(format!(
                    "identity record '{}' is not an object: {}",
                    self.identity_key, other
                )))
            }
        };

        let prefix = fields.prefix_for(&identity);
        debug!("Resolved cache namespace {}", mask_prefix(&prefix));
        Ok(prefix)
    }

    /// Identity fields named by the configuration record, or the defaults.
    pub fn fields(&self) -> Result<NamespaceFields> {
        let config = match self.read(&self.config_key)? {
            None => return Ok(self.default_fields.clone()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(CacheError::NamespaceResolutionFailed(format!(
                    "configuration record '{}' is not an object: {}",
                    self.config_key, other
                )))
            }
        };

        match config.get(USER_FIELDS_ENTRY) {
            None | Some(Value::Null) => Ok(self.default_fields.clone()),
            Some(value) => NamespaceFields::from_json(value),
        }
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        self.store.get_item(key).map_err(|e| {
            CacheError::NamespaceResolutionFailed(format!("failed to read '{}': {}", key, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use serde_json::json;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Result<Option<Value>> {
            Err(CacheError::KeyValue("disk on fire".to_string()))
        }
        fn set_item(&self, _key: &str, _value: Value) -> Result<()> {
            Err(CacheError::KeyValue("disk on fire".to_string()))
        }
        fn remove_item(&self, _key: &str) -> Result<()> {
            Err(CacheError::KeyValue("disk on fire".to_string()))
        }
    }

    fn resolver(store: Arc<dyn KeyValueStore>) -> NamespaceResolver {
        NamespaceResolver::new(
            store,
            "app_config",
            "user",
            NamespaceFields::new(["id"]).unwrap(),
        )
    }

    #[test]
    fn test_empty_store_yields_shared_namespace() {
        let resolver = resolver(Arc::new(MemoryStore::new()));
        assert_eq!(resolver.resolve().unwrap(), "");
        assert_eq!(resolver.current_prefix(), "");
    }

    #[test]
    fn test_default_field_is_id() {
        let store = Arc::new(MemoryStore::new());
        store.set_item("user", json!({"id": 7, "name": "Ann"})).unwrap();

        assert_eq!(resolver(store).current_prefix(), "7_");
    }

    #[test]
    fn test_configured_fields_in_order() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item("app_config", json!({"cache_user_fields": ["org", "id", "missing", "role"]}))
            .unwrap();
        store
            .set_item("user", json!({"id": 3, "org": "acme", "role": null}))
            .unwrap();

        assert_eq!(resolver(store).current_prefix(), "acme_3_");
    }

    #[test]
    fn test_empty_string_value_yields_shared_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.set_item("user", json!({"id": ""})).unwrap();

        assert_eq!(resolver(store).current_prefix(), "");
    }

    #[test]
    fn test_malformed_config_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_item("app_config", json!({"cache_user_fields": "id"}))
            .unwrap();
        store.set_item("user", json!({"id": 7})).unwrap();

        let resolver = resolver(store);
        assert!(matches!(
            resolver.resolve(),
            Err(CacheError::NamespaceResolutionFailed(_))
        ));
        assert_eq!(resolver.current_prefix(), "");
    }

    #[test]
    fn test_identity_not_object_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store.set_item("user", json!("ann")).unwrap();

        assert_eq!(resolver(store).current_prefix(), "");
    }

    #[test]
    fn test_store_failure_falls_back() {
        let resolver = resolver(Arc::new(BrokenStore));
        assert!(resolver.resolve().is_err());
        assert_eq!(resolver.current_prefix(), "");
    }

    #[test]
    fn test_field_validation() {
        assert!(NamespaceFields::new(Vec::<String>::new()).is_err());
        assert!(NamespaceFields::new(["id", " "]).is_err());
        assert!(NamespaceFields::new(["id", "id"]).is_err());
        assert!(NamespaceFields::from_json(&json!(["id", 3])).is_err());
        assert_eq!(
            NamespaceFields::from_json(&json!(["tenant", "id"]))
                .unwrap()
                .as_slice(),
            ["tenant".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn test_value_rendering() {
        let fields = NamespaceFields::new(["a", "b", "c"]).unwrap();
        let identity = json!({"a": true, "b": 1.5, "c": [1, 2]});
        let prefix = fields.prefix_for(identity.as_object().unwrap());
        assert_eq!(prefix, "true_1.5_[1,2]_");
    }
}
