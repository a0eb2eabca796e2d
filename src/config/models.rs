//! Configuration data structures for scopecache.
//!
//! This module defines the schema for the application settings: where the
//! cache database and key-value store live, how namespaces are derived, and
//! how logs are emitted.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Cache database settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Tenant namespace derivation settings.
    #[serde(default)]
    pub namespace: NamespaceSettings,

    /// Key-value store settings.
    #[serde(default)]
    pub store: StoreSettings,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the persistent cache database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Path of the SQLite database file.
    /// Default: `~/.scopecache/table_cache.db`
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Whether table caching is enabled at all.
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound for a single cache operation, in milliseconds.
    /// Default: `5000`
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,

    /// How long SQLite waits on a lock held by another process, in milliseconds.
    /// Default: `2000`
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

/// Settings for deriving the per-user key prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceSettings {
    /// Key-value store key holding the application configuration record.
    /// Default: `app_config`
    #[serde(default = "default_config_key")]
    pub config_key: String,

    /// Key-value store key holding the signed-in user record.
    /// Default: `user`
    #[serde(default = "default_identity_key")]
    pub identity_key: String,

    /// Identity fields used when the configuration record names none.
    /// Default: `["id"]`
    #[serde(default = "default_fields")]
    pub default_fields: Vec<String>,
}

/// Settings for the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Path of the JSON document backing the store.
    /// Default: `~/.scopecache/store.json`
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `warn`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            enabled: true,
            operation_timeout_ms: default_operation_timeout(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            config_key: default_config_key(),
            identity_key: default_identity_key(),
            default_fields: default_fields(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".scopecache")
}

fn default_db_path() -> String {
    data_dir().join("table_cache.db").to_string_lossy().to_string()
}

fn default_store_path() -> String {
    data_dir().join("store.json").to_string_lossy().to_string()
}

fn default_true() -> bool {
    true
}

fn default_operation_timeout() -> u64 {
    5000
}

fn default_busy_timeout() -> u64 {
    2000
}

fn default_config_key() -> String {
    "app_config".to_string()
}

fn default_identity_key() -> String {
    "user".to_string()
}

fn default_fields() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
