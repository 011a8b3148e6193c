//! In-memory document store
//!
//! Backs tests and embedded deployments. Collections are key-ordered maps
//! guarded by a write lock; every mutation publishes a fresh full snapshot
//! to that collection's watch channel, so subscribers get the same
//! replace-not-patch behavior as the remote store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::{with_id, DocumentStore, Subscription, SERVER_TIMESTAMP};
use crate::error::StoreError;

type Collection = BTreeMap<String, Value>;

/// In-process [`DocumentStore`] with live snapshot channels.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    watchers: RwLock<HashMap<String, watch::Sender<Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the server-timestamp sentinel against the local clock.
    fn resolve_sentinels(data: &mut Value) {
        let Value::Object(map) = data else {
            return;
        };
        let now = Utc::now().to_rfc3339();
        for value in map.values_mut() {
            if value.as_str() == Some(SERVER_TIMESTAMP) {
                *value = Value::String(now.clone());
            }
        }
    }

    fn snapshot_of(collection: &Collection) -> Vec<Value> {
        collection
            .iter()
            .map(|(id, data)| with_id(id, data.clone()))
            .collect()
    }

    /// Push the collection's current snapshot to its watch channel, if one
    /// has been opened.
    async fn notify(&self, name: &str, snapshot: Vec<Value>) {
        let watchers = self.watchers.read().await;
        if let Some(sender) = watchers.get(name) {
            sender.send_replace(snapshot);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(Self::snapshot_of)
            .unwrap_or_default())
    }

    async fn add(&self, collection: &str, mut data: Value) -> Result<String, StoreError> {
        Self::resolve_sentinels(&mut data);
        let id = Uuid::new_v4().to_string();
        let snapshot = {
            let mut collections = self.collections.write().await;
            let entry = collections.entry(collection.to_string()).or_default();
            entry.insert(id.clone(), data);
            Self::snapshot_of(entry)
        };
        self.notify(collection, snapshot).await;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, mut data: Value) -> Result<(), StoreError> {
        Self::resolve_sentinels(&mut data);
        let snapshot = {
            let mut collections = self.collections.write().await;
            let entry = collections.entry(collection.to_string()).or_default();
            entry.insert(id.to_string(), data);
            Self::snapshot_of(entry)
        };
        self.notify(collection, snapshot).await;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, mut data: Value) -> Result<(), StoreError> {
        Self::resolve_sentinels(&mut data);
        let snapshot = {
            let mut collections = self.collections.write().await;
            let entry = collections.entry(collection.to_string()).or_default();
            let Some(existing) = entry.get_mut(id) else {
                return Err(StoreError::MissingDocument {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            };
            if let (Value::Object(target), Value::Object(fields)) = (existing, data) {
                for (key, value) in fields {
                    target.insert(key, value);
                }
            }
            Self::snapshot_of(entry)
        };
        self.notify(collection, snapshot).await;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let snapshot = {
            let mut collections = self.collections.write().await;
            let entry = collections.entry(collection.to_string()).or_default();
            entry.remove(id);
            Self::snapshot_of(entry)
        };
        self.notify(collection, snapshot).await;
        Ok(())
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        // One write-lock critical section: the batch lands as a whole.
        let snapshot = {
            let mut collections = self.collections.write().await;
            let entry = collections.entry(collection.to_string()).or_default();
            for id in ids {
                entry.remove(id);
            }
            Self::snapshot_of(entry)
        };
        self.notify(collection, snapshot).await;
        Ok(())
    }

    async fn watch(&self, collection: &str) -> Result<Subscription, StoreError> {
        let mut watchers = self.watchers.write().await;
        if let Some(sender) = watchers.get(collection) {
            return Ok(Subscription::new(sender.subscribe(), None));
        }

        let initial = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(Self::snapshot_of)
                .unwrap_or_default()
        };
        let (sender, rx) = watch::channel(initial);
        watchers.insert(collection.to_string(), sender);
        Ok(Subscription::new(rx, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;
    use serde_json::json;

    #[tokio::test]
    async fn add_generates_id_and_get_all_injects_it() {
        let store = MemoryStore::new();
        let id = store.add("posts", json!({"title": "t"})).await.unwrap();

        let docs = store.get_all("posts").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], id.as_str());
        assert_eq!(docs[0]["title"], "t");
    }

    #[tokio::test]
    async fn set_then_update_merges_fields() {
        let store = MemoryStore::new();
        store
            .set("posts", "p1", json!({"title": "t", "rank": 1}))
            .await
            .unwrap();
        store
            .update("posts", "p1", json!({"rank": 2}))
            .await
            .unwrap();

        let docs = store.get_all("posts").await.unwrap();
        assert_eq!(docs[0]["title"], "t");
        assert_eq!(docs[0]["rank"], 2);
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("posts", "ghost", json!({"rank": 2}))
            .await
            .unwrap_err();
        assert!(err.is_missing());
    }

    #[tokio::test]
    async fn server_timestamp_sentinel_resolves_to_rfc3339() {
        let store = MemoryStore::new();
        store
            .set("posts", "p1", json!({"createdate": server_timestamp()}))
            .await
            .unwrap();

        let docs = store.get_all("posts").await.unwrap();
        let stamp = docs[0]["createdate"].as_str().unwrap();
        assert_ne!(stamp, SERVER_TIMESTAMP);
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[tokio::test]
    async fn watch_sees_every_replacement() {
        let store = MemoryStore::new();
        let mut sub = store.watch("posts").await.unwrap();
        assert!(sub.current().is_empty());

        store.set("posts", "p1", json!({"title": "t"})).await.unwrap();
        sub.changed().await.unwrap();
        assert_eq!(sub.current().len(), 1);

        store.delete("posts", "p1").await.unwrap();
        sub.changed().await.unwrap();
        assert!(sub.current().is_empty());
    }

    #[tokio::test]
    async fn delete_many_is_atomic_and_idempotent() {
        let store = MemoryStore::new();
        store.set("posts", "p1", json!({})).await.unwrap();
        store.set("posts", "p2", json!({})).await.unwrap();
        let mut sub = store.watch("posts").await.unwrap();

        let ids = vec!["p1".to_string(), "p2".to_string()];
        store.delete_many("posts", &ids).await.unwrap();
        sub.changed().await.unwrap();
        // Both gone in one delivery, no intermediate one-left snapshot.
        assert!(sub.current().is_empty());

        store.delete_many("posts", &ids).await.unwrap();
        assert!(store.get_all("posts").await.unwrap().is_empty());
    }
}
