//! Sign-in and sign-out of the cache's current user.
//!
//! The signed-in user record lives in the key-value store and decides the
//! cache namespace. Signing out drops the session keys and flushes the whole
//! cache so nothing cached for that user outlives the session.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::cache::{Outcome, ScopedCache};
use crate::error::{CacheError, Result};
use crate::kv::{KeyValueStore, SESSION_KEYS};
use serde_json::Value;
use tracing::{info, warn};

/// Records `identity` as the signed-in user under `identity_key`.
///
/// # Errors
///
/// Returns `CacheError::UnsupportedValue` if the identity is not a JSON
/// object, or the store's error if the write fails.
pub fn sign_in(store: &dyn KeyValueStore, identity_key: &str, identity: Value) -> Result<()> {
    if !identity.is_object() {
        return Err(CacheError::UnsupportedValue(format!(
            "identity must be a JSON object, found {}",
            identity
        )));
    }
    store.set_item(identity_key, identity)?;
    info!("Signed in; cache namespace switched");
    Ok(())
}

/// Removes the session keys from `store` and clears the cache.
///
/// Store failures are logged and do not stop the cache flush.
pub async fn sign_out(store: &dyn KeyValueStore, cache: &ScopedCache) -> Outcome<()> {
    for key in SESSION_KEYS {
        if let Err(e) = store.remove_item(key) {
            warn!("Failed to remove session key '{}': {}", key, e);
        }
    }
    let identity_key = &cache.config().identity_key;
    if !SESSION_KEYS.contains(&identity_key.as_str()) {
        if let Err(e) = store.remove_item(identity_key) {
            warn!("Failed to remove identity key '{}': {}", identity_key, e);
        }
    }

    let outcome = cache.clear().await;
    info!("Signed out");
    outcome
}
