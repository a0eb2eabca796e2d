// Scoped cache behaviour tests - public API only
// Author: kelexine (https://github.com/kelexine)

use scopecache::cache::{CacheConfig, ScopedCache, WriteMetadata};
use scopecache::error::CacheError;
use scopecache::kv::{KeyValueStore, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

fn setup() -> (TempDir, Arc<MemoryStore>, ScopedCache) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let cache = ScopedCache::new(CacheConfig::new(dir.path().join("cache.db")), store.clone())
        .unwrap();
    (dir, store, cache)
}

#[tokio::test]
async fn test_falsy_values_round_trip() {
    let (_dir, _store, cache) = setup();

    for (key, value) in [
        ("zero", json!(0)),
        ("false", json!(false)),
        ("empty_string", json!("")),
        ("empty_object", json!({})),
        ("empty_list", json!([])),
    ] {
        cache.set_item(key, &value, None).await;
        let got = cache.get_item(key, json!("default")).await;
        assert!(!got.is_recovered());
        assert_eq!(got.into_inner(), value, "value for {}", key);
    }
}

#[tokio::test]
async fn test_missing_key_returns_default() {
    let (_dir, _store, cache) = setup();

    assert_eq!(cache.get_item("never", json!(42)).await.into_inner(), json!(42));
    assert_eq!(cache.get_item("never", Value::Null).await.into_inner(), Value::Null);
}

#[tokio::test]
async fn test_remove_then_get_returns_default() {
    let (_dir, _store, cache) = setup();

    cache
        .set_item("list", &json!([1, 2]), Some(WriteMetadata::from_url("/api/list")))
        .await;
    let removed = cache.remove_item("list").await;
    assert!(!removed.is_recovered());

    assert_eq!(cache.get_item("list", json!("d")).await.into_inner(), json!("d"));
    assert_eq!(cache.metadata("list").await.into_inner(), None);

    // Removing an absent key still completes.
    assert!(!cache.remove_item("list").await.is_recovered());
}

#[tokio::test]
async fn test_clear_flushes_every_namespace() {
    let (_dir, store, cache) = setup();

    store.set_item("user", json!({"id": 1})).unwrap();
    cache.set_item("x", "one", Some(WriteMetadata::from_url("/x"))).await;
    store.set_item("user", json!({"id": 2})).unwrap();
    cache.set_item("x", "two", None).await;
    store.remove_item("user").unwrap();
    cache.set_item("x", "shared", None).await;

    assert!(!cache.clear().await.is_recovered());

    assert_eq!(cache.get_item("x", json!("d")).await.into_inner(), json!("d"));
    store.set_item("user", json!({"id": 1})).unwrap();
    assert_eq!(cache.get_item("x", json!("d")).await.into_inner(), json!("d"));
    store.set_item("user", json!({"id": 2})).unwrap();
    assert_eq!(cache.get_item("x", json!("d")).await.into_inner(), json!("d"));
    assert!(cache.list_metadata().await.into_inner().is_empty());
}

#[tokio::test]
async fn test_namespace_isolation() {
    let (_dir, store, cache) = setup();

    store.set_item("user", json!({"id": 1})).unwrap();
    cache.set_item("x", "A-value", None).await;

    store.set_item("user", json!({"id": 2})).unwrap();
    assert_eq!(cache.get_item("x", Value::Null).await.into_inner(), Value::Null);

    store.set_item("user", json!({"id": 1})).unwrap();
    assert_eq!(cache.get_item("x", Value::Null).await.into_inner(), json!("A-value"));
}

#[tokio::test]
async fn test_metadata_accompanies_write() {
    let (_dir, store, cache) = setup();
    store.set_item("user", json!({"id": 7})).unwrap();

    let before = chrono::Utc::now().timestamp_millis();
    cache
        .set_item("list", &json!([{"id": 1}]), Some(WriteMetadata::from_url("/api/list")))
        .await;
    let after = chrono::Utc::now().timestamp_millis();

    let meta = cache.metadata("list").await.into_inner().unwrap();
    assert_eq!(meta.key, "7_list");
    assert_eq!(meta.original_key, "list");
    assert_eq!(meta.url.as_deref(), Some("/api/list"));
    assert!(meta.timestamp >= before && meta.timestamp <= after);
}

#[tokio::test]
async fn test_write_without_metadata_records_none() {
    let (_dir, _store, cache) = setup();

    cache.set_item("plain", "v", None).await;
    assert_eq!(cache.metadata("plain").await.into_inner(), None);
}

#[tokio::test]
async fn test_identity_scenario_prefix() {
    let (_dir, store, cache) = setup();
    assert_eq!(cache.current_prefix(), "");

    store.set_item("app_config", json!({"cache_user_fields": ["id"]})).unwrap();
    store.set_item("user", json!({"id": 7})).unwrap();
    assert_eq!(cache.current_prefix(), "7_");

    cache
        .set_item("orders", &json!([1, 2]), Some(WriteMetadata::from_url("/api/orders")))
        .await;
    let records = cache.list_metadata().await.into_inner();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, "7_orders");
}

#[tokio::test]
async fn test_concurrent_opens_share_one_attempt() {
    let (_dir, _store, cache) = setup();

    let (a, b) = tokio::join!(
        cache.connections().connection(),
        cache.connections().connection()
    );
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(cache.connections().open_attempts(), 1);

    let (set, get) = tokio::join!(
        cache.set_item("k", "v", None),
        cache.get_item("other", Value::Null)
    );
    assert!(!set.is_recovered());
    assert!(!get.is_recovered());
    assert_eq!(cache.connections().open_attempts(), 1);
}

#[tokio::test]
async fn test_unavailable_store_degrades_gracefully() {
    let blocker = NamedTempFile::new().unwrap();
    let db_path = blocker.path().join("cache.db");
    let cache = ScopedCache::new(CacheConfig::new(db_path), Arc::new(MemoryStore::new())).unwrap();

    let set = cache.set_item("k", "v", None).await;
    assert!(matches!(set.error(), Some(CacheError::StoreUnavailable(_))));

    let got = cache.get_item("k", json!("fallback")).await;
    assert!(got.is_recovered());
    assert_eq!(got.into_inner(), json!("fallback"));

    assert!(cache.remove_item("k").await.is_recovered());
    assert!(cache.clear().await.is_recovered());
}

#[tokio::test]
async fn test_entries_persist_across_instances() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store.set_item("user", json!({"id": 3})).unwrap();

    {
        let cache = ScopedCache::new(CacheConfig::new(&db_path), store.clone()).unwrap();
        cache.set_item("report", &json!({"rows": 10}), None).await;
    }

    let cache = ScopedCache::new(CacheConfig::new(&db_path), store).unwrap();
    assert_eq!(
        cache.get_item("report", Value::Null).await.into_inner(),
        json!({"rows": 10})
    );
}
