//! Cache configuration, persisted records and operation outcomes.

// Author: kelexine (https://github.com/kelexine)

use crate::config::{CacheSettings, NamespaceSettings};
use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for a [`ScopedCache`](super::ScopedCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled. When disabled, reads miss and writes are skipped.
    pub enabled: bool,
    /// Location of the SQLite database file.
    pub db_path: PathBuf,
    /// Upper bound for one cache operation, connection opening included.
    pub operation_timeout: Duration,
    /// How long SQLite waits on a lock held by another connection.
    pub busy_timeout: Duration,
    /// Key-value store key of the application configuration record.
    pub config_key: String,
    /// Key-value store key of the signed-in user record.
    pub identity_key: String,
    /// Identity fields used when the configuration record names none.
    pub default_fields: Vec<String>,
}

impl CacheConfig {
    /// Configuration pointing at `db_path`, everything else defaulted.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self::from_settings(&CacheSettings::default(), &NamespaceSettings::default())
            .with_db_path(db_path)
    }

    pub fn from_settings(cache: &CacheSettings, namespace: &NamespaceSettings) -> Self {
        Self {
            enabled: cache.enabled,
            db_path: PathBuf::from(&cache.db_path),
            operation_timeout: Duration::from_millis(cache.operation_timeout_ms),
            busy_timeout: Duration::from_millis(cache.busy_timeout_ms),
            config_key: namespace.config_key.clone(),
            identity_key: namespace.identity_key.clone(),
            default_fields: namespace.default_fields.clone(),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

/// Provenance supplied by the caller on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteMetadata {
    /// URL the cached data was fetched from.
    pub url: Option<String>,
}

impl WriteMetadata {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

/// Metadata record stored alongside a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Namespaced key.
    pub key: String,
    /// Key as supplied by the caller.
    pub original_key: String,
    pub url: Option<String>,
    /// Write time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Result of a cache operation.
///
/// Cache operations never fail towards the caller. A storage failure is
/// recovered into a safe value, and the error is kept here so callers and
/// tests can tell a recovered result from a genuine one.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Recovered { value: T, error: CacheError },
}

impl<T> Outcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Completed(value) | Outcome::Recovered { value, .. } => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Completed(value) | Outcome::Recovered { value, .. } => value,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Outcome::Recovered { .. })
    }

    pub fn error(&self) -> Option<&CacheError> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Recovered { error, .. } => Some(error),
        }
    }
}
