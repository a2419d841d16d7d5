//! Local store behavior through the public API

use crate::common::memory_store;
use fieldsync::client::local_db::{Collection, StoreError, StoreIndex, CURRENT_SCHEMA_VERSION};
use fieldsync::client::LocalDatabase;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = memory_store().await;
    let key = store
        .put(Collection::SyncQueue, json!({"action": {"type": "status_update"}}), None)
        .await
        .unwrap();

    crate::assert_ok!(store.delete(Collection::SyncQueue, &key).await);
    crate::assert_ok!(store.delete(Collection::SyncQueue, &key).await);
    assert_eq!(store.get(Collection::SyncQueue, &key).await.unwrap(), None);
}

#[tokio::test]
async fn test_queue_keys_increase_and_are_not_reused() {
    let store = memory_store().await;
    let first = store.put(Collection::SyncQueue, json!({}), None).await.unwrap();
    let second = store.put(Collection::SyncQueue, json!({}), None).await.unwrap();
    store.delete(Collection::SyncQueue, &second).await.unwrap();
    let third = store.put(Collection::SyncQueue, json!({}), None).await.unwrap();

    assert_eq!((first.as_str(), second.as_str(), third.as_str()), ("1", "2", "3"));
}

#[tokio::test]
async fn test_entity_overwrite_keeps_one_record() {
    let store = memory_store().await;
    store
        .put(Collection::Deliveries, json!({"id": "d-1", "status": "pending"}), None)
        .await
        .unwrap();
    store
        .put(Collection::Deliveries, json!({"id": "d-1", "status": "delivered"}), None)
        .await
        .unwrap();

    let all = store.get_all(Collection::Deliveries).await.unwrap();
    assert_eq!(all, vec![json!({"id": "d-1", "status": "delivered"})]);
}

#[tokio::test]
async fn test_index_lookup() {
    let store = memory_store().await;
    for (id, status) in [("d-1", "pending"), ("d-2", "delivered"), ("d-3", "pending")] {
        store
            .put(Collection::Deliveries, json!({"id": id, "status": status}), None)
            .await
            .unwrap();
    }

    let pending = store
        .get_all_by_index(Collection::Deliveries, StoreIndex::Status, "pending")
        .await
        .unwrap();
    let ids: Vec<_> = pending.iter().map(|d| d["id"].clone()).collect();
    assert_eq!(ids, vec![json!("d-1"), json!("d-3")]);

    let wrong = store
        .get_all_by_index(Collection::Drivers, StoreIndex::Status, "pending")
        .await;
    assert!(matches!(wrong, Err(StoreError::UnknownIndex { .. })));
}

#[tokio::test]
async fn test_entity_without_id_is_rejected() {
    let store = memory_store().await;
    let result = store.put(Collection::Routes, json!({"stops": 4}), None).await;
    assert!(matches!(result, Err(StoreError::MissingKey("routes"))));
}

#[tokio::test]
async fn test_clear_cache_keeps_outbox() {
    let store = memory_store().await;
    store.put(Collection::Deliveries, json!({"id": "d-1"}), None).await.unwrap();
    store.put(Collection::Routes, json!({"id": "r-1"}), None).await.unwrap();
    store.put(Collection::SyncQueue, json!({}), None).await.unwrap();

    assert_eq!(store.clear_cache().await.unwrap(), 2);

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.cached_deliveries, 0);
    assert_eq!(stats.pending_actions, 1);
}

#[tokio::test]
async fn test_file_store_reopens_with_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("driver-app-db.db");

    let store = LocalDatabase::open(&path).await.unwrap();
    store.put(Collection::Drivers, json!({"id": "me", "name": "Sam"}), None).await.unwrap();
    store.close().await;

    let reopened = LocalDatabase::open(&path).await.unwrap();
    assert_eq!(reopened.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(
        reopened.get(Collection::Drivers, "me").await.unwrap(),
        Some(json!({"id": "me", "name": "Sam"}))
    );
}
