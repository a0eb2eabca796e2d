// Error types for the scoped cache
// Author: kelexine (https://github.com/kelexine)

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cache transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Namespace resolution failed: {0}")]
    NamespaceResolutionFailed(String),

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Unsupported cache value: {0}")]
    UnsupportedValue(String),

    #[error("Key-value store error: {0}")]
    KeyValue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::StoreUnavailable(_) => "store_unavailable",
            CacheError::TransactionFailed(_) => "transaction_failed",
            CacheError::NamespaceResolutionFailed(_) => "namespace_resolution_failed",
            CacheError::Timeout(_) => "timeout",
            CacheError::UnsupportedValue(_) => "unsupported_value",
            CacheError::KeyValue(_) => "key_value",
            CacheError::Config(_) | CacheError::ConfigParsing(_) => "config",
            CacheError::Io(_) => "io",
            CacheError::Json(_) => "json",
            CacheError::Internal(_) => "internal",
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::TransactionFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
