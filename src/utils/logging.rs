//! Structured logging and privacy-focused trace utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides a helper that keeps user identity values (which make up cache
//! namespaces) out of log sinks.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::LoggingConfig;
use crate::error::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber for the application.
///
/// Supports two output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Masks a namespace prefix for logging.
///
/// Segment boundaries stay visible, every other character is replaced by
/// `*`, so `42_acme_` is logged as `**_****_`. The empty (shared) prefix is
/// shown as `<shared>`.
pub fn mask_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return "<shared>".to_string();
    }
    prefix
        .chars()
        .map(|c| if c == '_' { '_' } else { '*' })
        .collect()
}

/// Masks the namespace part of a prefixed cache key.
pub fn mask_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}", mask_prefix(prefix), key)
    }
}
