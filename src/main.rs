// scopecache - Per-user persistent key/value cache with provenance metadata
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use clap::Parser;
use scopecache::cache::{CacheConfig, Outcome, ScopedCache, WriteMetadata};
use scopecache::cli::{Args, Command};
use scopecache::config::AppConfig;
use scopecache::kv::{FileStore, KeyValueStore};
use scopecache::utils::logging;
use scopecache::{metrics, session};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    debug!("Starting scopecache v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Open the key-value store and the cache
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.store.path)
            .with_context(|| format!("opening key-value store {}", config.store.path))?,
    );
    let cache = ScopedCache::new(
        CacheConfig::from_settings(&config.cache, &config.namespace),
        store.clone(),
    )?;

    // Phase 4: Run the command
    match args.command {
        Command::Get { key, default } => {
            let default = parse_json(&default)?;
            let value = report(cache.get_item(&key, default).await);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Set { key, value, url } => {
            let value = parse_json(&value)?;
            let metadata = url.map(WriteMetadata::from_url);
            report(cache.set_item(&key, &value, metadata).await);
        }
        Command::Remove { key } => {
            report(cache.remove_item(&key).await);
        }
        Command::Clear => {
            report(cache.clear().await);
        }
        Command::Meta { key } => match report(cache.metadata(&key).await) {
            Some(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
            None => println!("null"),
        },
        Command::ListMeta => {
            let records = report(cache.list_metadata().await);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Prefix => {
            println!("{}", cache.current_prefix());
        }
        Command::Identity { identity } => {
            session::sign_in(store.as_ref(), &config.namespace.identity_key, parse_json(&identity)?)?;
            println!("{}", cache.current_prefix());
        }
        Command::SignOut => {
            report(session::sign_out(store.as_ref(), &cache).await);
        }
    }

    // Phase 5: Report what this run recorded
    if args.print_metrics {
        print!("{}", metrics::gather_metrics());
    }

    Ok(())
}

fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("invalid JSON: {}", raw))
}

/// Unwraps an outcome, telling the user when the cache was bypassed.
fn report<T>(outcome: Outcome<T>) -> T {
    if let Some(error) = outcome.error() {
        warn!("Cache bypassed: {}", error);
        eprintln!("warning: cache bypassed: {}", error);
    }
    outcome.into_inner()
}
