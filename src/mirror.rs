//! Resource mirror
//!
//! Per-resource in-memory cache fed by a store subscription. The backing
//! watch channel makes every snapshot delivery a single atomic
//! replacement: readers see the old list or the new list, never a half
//! of each.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::watch;

use crate::store::Subscription;

/// How a resource behaves in the CRUD operations, decided once when the
/// resource is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// Ordinary collection-backed resource.
    Plain,
    /// Per-user overlay of a template collection: records carry a
    /// `questionId` pointing at the template record they override.
    UserOverlay { template: String },
}

impl ResourceKind {
    /// The template collection name, for overlay resources.
    pub fn template(&self) -> Option<&str> {
        match self {
            ResourceKind::Plain => None,
            ResourceKind::UserOverlay { template } => Some(template),
        }
    }
}

/// Live cache of one resource's documents.
#[derive(Debug)]
pub struct ResourceMirror {
    name: String,
    kind: ResourceKind,
    rx: watch::Receiver<Vec<Value>>,
    // Held only for lifecycle control; the receiver above outlives close().
    subscription: Mutex<Option<Subscription>>,
}

impl ResourceMirror {
    pub(crate) fn new(name: String, kind: ResourceKind, subscription: Subscription) -> Self {
        Self {
            name,
            kind,
            rx: subscription.receiver(),
            subscription: Mutex::new(Some(subscription)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// The latest full snapshot of the resource's records.
    pub fn records(&self) -> Vec<Value> {
        self.rx.borrow().clone()
    }

    /// A receiver for awaiting future snapshot deliveries.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Value>> {
        self.rx.clone()
    }

    /// Release the feeding subscription and its delivery loop. Reads keep
    /// answering from the last observed snapshot.
    pub fn close(&self) {
        let mut guard = self.subscription.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut subscription) = guard.take() {
            subscription.close();
        }
    }
}

impl Drop for ResourceMirror {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn records_track_snapshot_deliveries() {
        let store = MemoryStore::new();
        let subscription = store.watch("things").await.unwrap();
        let mirror = ResourceMirror::new("things".to_string(), ResourceKind::Plain, subscription);
        assert!(mirror.records().is_empty());

        let mut rx = mirror.subscribe();
        store.set("things", "t1", json!({"name": "one"})).await.unwrap();
        rx.changed().await.unwrap();

        let records = mirror.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["id"], "t1");
    }

    #[tokio::test]
    async fn closed_mirror_keeps_answering_from_last_snapshot() {
        let store = MemoryStore::new();
        store.set("things", "t1", json!({})).await.unwrap();
        let subscription = store.watch("things").await.unwrap();
        let mirror = ResourceMirror::new("things".to_string(), ResourceKind::Plain, subscription);

        mirror.close();
        assert_eq!(mirror.records().len(), 1);
        // Closing twice is fine.
        mirror.close();
    }
}
