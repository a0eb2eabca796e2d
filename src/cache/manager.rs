// Scoped cache - namespaced get/set/remove/clear over the cache database
// Author: kelexine (https://github.com/kelexine)

use super::connection::{ConnectionManager, METADATA_TABLE, VALUE_TABLE};
use super::models::{CacheConfig, CacheMetadata, Outcome, WriteMetadata};
use super::namespace::{NamespaceFields, NamespaceResolver};
use crate::error::{CacheError, Result};
use crate::kv::KeyValueStore;
use crate::utils::logging::mask_key;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-user persistent cache.
///
/// Every operation prefixes its key with the current user's namespace and
/// runs against the shared database connection. Storage failures never
/// reach the caller: they are logged and turned into an [`Outcome::Recovered`]
/// carrying the safe value (the default for reads, `()` for writes).
pub struct ScopedCache {
    config: CacheConfig,
    connections: Arc<ConnectionManager>,
    namespace: NamespaceResolver,
}

impl ScopedCache {
    /// Create a new cache reading identities from `store`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NamespaceResolutionFailed` if the default
    /// identity fields in `config` are invalid.
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let default_fields = NamespaceFields::new(config.default_fields.clone())?;
        let namespace = NamespaceResolver::new(
            store,
            config.config_key.clone(),
            config.identity_key.clone(),
            default_fields,
        );
        let connections = Arc::new(ConnectionManager::new(
            config.db_path.clone(),
            config.busy_timeout,
        ));

        Ok(Self {
            config,
            connections,
            namespace,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Prefix applied to keys for the currently signed-in user.
    pub fn current_prefix(&self) -> String {
        self.namespace.current_prefix()
    }

    /// Store `value` under `key`, with optional provenance metadata.
    ///
    /// The value and its metadata are written in one transaction. A failed
    /// metadata write is logged and does not undo the value write. `null`
    /// cannot be cached.
    pub async fn set_item<V>(&self, key: &str, value: &V, metadata: Option<WriteMetadata>) -> Outcome<()>
    where
        V: Serialize + ?Sized,
    {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("set", started, ());
        }

        let prefix = self.namespace.current_prefix();
        let result = match prepare_write(&prefix, key, value, metadata) {
            Ok((namespaced, text, record)) => {
                self.connections
                    .run(self.config.operation_timeout, move |conn| {
                        write_entry(conn, &namespaced, &text, record.as_ref())
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!("Cached {}", mask_key(&prefix, key));
                self.completed("set", "ok", started, ())
            }
            Err(e) => self.recovered("set", &prefix, key, started, (), e),
        }
    }

    /// Value stored under `key`, or `default` when absent.
    ///
    /// Falsy values (`0`, `false`, `""`, `{}`) are returned as stored.
    pub async fn get_item(&self, key: &str, default: Value) -> Outcome<Value> {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("get", started, default);
        }

        let prefix = self.namespace.current_prefix();
        match self.fetch(&prefix, key).await {
            Ok(Some(value)) => self.completed("get", "hit", started, value),
            Ok(None) => self.completed("get", "miss", started, default),
            Err(e) => self.recovered("get", &prefix, key, started, default, e),
        }
    }

    /// Typed variant of [`ScopedCache::get_item`].
    ///
    /// A stored value that does not deserialize into `T` is treated as a
    /// failure and recovered to `default`.
    pub async fn get_as<T>(&self, key: &str, default: T) -> Outcome<T>
    where
        T: DeserializeOwned,
    {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("get", started, default);
        }

        let prefix = self.namespace.current_prefix();
        let fetched = self.fetch(&prefix, key).await.and_then(|found| {
            found
                .map(|value| serde_json::from_value::<T>(value).map_err(CacheError::from))
                .transpose()
        });

        match fetched {
            Ok(Some(value)) => self.completed("get", "hit", started, value),
            Ok(None) => self.completed("get", "miss", started, default),
            Err(e) => self.recovered("get", &prefix, key, started, default, e),
        }
    }

    /// Delete `key` and its metadata. Absent keys are not an error.
    pub async fn remove_item(&self, key: &str) -> Outcome<()> {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("remove", started, ());
        }

        let prefix = self.namespace.current_prefix();
        let namespaced = format!("{}{}", prefix, key);
        let result = self
            .connections
            .run(self.config.operation_timeout, move |conn| delete_entry(conn, &namespaced))
            .await;

        match result {
            Ok(()) => {
                debug!("Removed {}", mask_key(&prefix, key));
                self.completed("remove", "ok", started, ())
            }
            Err(e) => self.recovered("remove", &prefix, key, started, (), e),
        }
    }

    /// Delete every entry and metadata record, for all users.
    pub async fn clear(&self) -> Outcome<()> {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("clear", started, ());
        }

        let result = self.connections.run(self.config.operation_timeout, clear_all).await;

        match result {
            Ok(removed) => {
                info!("Cleared cache ({} entries)", removed);
                self.completed("clear", "ok", started, ())
            }
            Err(e) => self.recovered("clear", "", "*", started, (), e),
        }
    }

    /// Metadata recorded for `key` in the current namespace.
    pub async fn metadata(&self, key: &str) -> Outcome<Option<CacheMetadata>> {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("metadata", started, None);
        }

        let prefix = self.namespace.current_prefix();
        let namespaced = format!("{}{}", prefix, key);
        let result = self
            .connections
            .run(self.config.operation_timeout, move |conn| read_metadata(conn, &namespaced))
            .await;

        match result {
            Ok(found) => self.completed("metadata", "ok", started, found),
            Err(e) => self.recovered("metadata", &prefix, key, started, None, e),
        }
    }

    /// All metadata records, across namespaces, oldest write first.
    pub async fn list_metadata(&self) -> Outcome<Vec<CacheMetadata>> {
        let started = Instant::now();
        if !self.config.enabled {
            return self.skipped("list_metadata", started, Vec::new());
        }

        let result = self.connections.run(self.config.operation_timeout, list_all_metadata).await;

        match result {
            Ok(records) => self.completed("list_metadata", "ok", started, records),
            Err(e) => self.recovered("list_metadata", "", "*", started, Vec::new(), e),
        }
    }

    async fn fetch(&self, prefix: &str, key: &str) -> Result<Option<Value>> {
        let namespaced = format!("{}{}", prefix, key);
        let stored = self
            .connections
            .run(self.config.operation_timeout, move |conn| read_entry(conn, &namespaced))
            .await?;

        match stored {
            None => Ok(None),
            Some(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Null => Ok(None),
                value => Ok(Some(value)),
            },
        }
    }

    fn completed<T>(&self, operation: &str, result: &str, started: Instant, value: T) -> Outcome<T> {
        crate::metrics::record_operation(operation, result, started.elapsed().as_secs_f64());
        Outcome::Completed(value)
    }

    fn skipped<T>(&self, operation: &str, started: Instant, value: T) -> Outcome<T> {
        debug!("Cache disabled, skipping {}", operation);
        self.completed(operation, "skipped", started, value)
    }

    fn recovered<T>(
        &self,
        operation: &str,
        prefix: &str,
        key: &str,
        started: Instant,
        value: T,
        error: CacheError,
    ) -> Outcome<T> {
        warn!(
            "Cache {} for {} failed, continuing without cache: {}",
            operation,
            mask_key(prefix, key),
            error
        );
        crate::metrics::record_recovered_error(operation, error.kind());
        crate::metrics::record_operation(operation, "recovered", started.elapsed().as_secs_f64());
        Outcome::Recovered { value, error }
    }
}

/// Serializes `value` and builds the metadata record for a write.
fn prepare_write<V>(
    prefix: &str,
    key: &str,
    value: &V,
    metadata: Option<WriteMetadata>,
) -> Result<(String, String, Option<CacheMetadata>)>
where
    V: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    if value.is_null() {
        return Err(CacheError::UnsupportedValue(format!(
            "null cannot be cached (key '{}')",
            key
        )));
    }

    let namespaced = format!("{}{}", prefix, key);
    let record = metadata.map(|meta| CacheMetadata {
        key: namespaced.clone(),
        original_key: key.to_string(),
        url: meta.url,
        timestamp: chrono::Utc::now().timestamp_millis(),
    });

    Ok((namespaced, value.to_string(), record))
}

fn write_entry(
    conn: &mut rusqlite::Connection,
    key: &str,
    value: &str,
    metadata: Option<&CacheMetadata>,
) -> Result<()> {
    let tx = conn.transaction()?;
    upsert_value(&tx, key, value)?;

    if let Some(meta) = metadata {
        let written = tx.execute(
            &format!(
                "INSERT INTO {METADATA_TABLE} (key, original_key, url, timestamp)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    original_key = excluded.original_key,
                    url = excluded.url,
                    timestamp = excluded.timestamp"
            ),
            params![meta.key, meta.original_key, meta.url, meta.timestamp],
        );
        if let Err(e) = written {
            warn!("Metadata write for '{}' failed: {}", meta.original_key, e);
            // SQLITE_FULL and I/O errors roll back the whole transaction.
            if tx.is_autocommit() {
                drop(tx);
                return upsert_value(conn, key, value);
            }
        }
    }

    tx.commit()?;
    Ok(())
}

fn upsert_value(conn: &rusqlite::Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {VALUE_TABLE} (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value"
        ),
        params![key, value],
    )?;
    Ok(())
}

fn read_entry(conn: &mut rusqlite::Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            &format!("SELECT value FROM {VALUE_TABLE} WHERE key = ?1"),
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

fn delete_entry(conn: &mut rusqlite::Connection, key: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(&format!("DELETE FROM {VALUE_TABLE} WHERE key = ?1"), params![key])?;
    tx.execute(&format!("DELETE FROM {METADATA_TABLE} WHERE key = ?1"), params![key])?;
    tx.commit()?;
    Ok(())
}

fn clear_all(conn: &mut rusqlite::Connection) -> Result<usize> {
    let tx = conn.transaction()?;
    let removed = tx.execute(&format!("DELETE FROM {VALUE_TABLE}"), [])?;
    tx.execute(&format!("DELETE FROM {METADATA_TABLE}"), [])?;
    tx.commit()?;
    Ok(removed)
}

fn metadata_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheMetadata> {
    Ok(CacheMetadata {
        key: row.get(0)?,
        original_key: row.get(1)?,
        url: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

fn read_metadata(conn: &mut rusqlite::Connection, key: &str) -> Result<Option<CacheMetadata>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT key, original_key, url, timestamp FROM {METADATA_TABLE} WHERE key = ?1"
            ),
            params![key],
            metadata_from_row,
        )
        .optional()?;
    Ok(record)
}

fn list_all_metadata(conn: &mut rusqlite::Connection) -> Result<Vec<CacheMetadata>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT key, original_key, url, timestamp FROM {METADATA_TABLE} ORDER BY timestamp, key"
    ))?;
    let rows = stmt.query_map([], metadata_from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
