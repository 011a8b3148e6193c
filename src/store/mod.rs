//! Document store capability
//!
//! The provider talks to its remote document database exclusively through
//! the [`DocumentStore`] trait: collection-scoped reads and writes, one
//! atomic batch-delete primitive, and a snapshot subscription used to feed
//! the in-memory mirrors.
//!
//! - [`http`] - REST-backed implementation for a remote store service
//! - [`memory`] - in-process implementation for tests and embedding

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::StoreError;

pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

/// Write-time sentinel for "whatever the store's clock says now".
///
/// Stores resolve it when the write lands, so every replica agrees on the
/// stamped instant.
pub const SERVER_TIMESTAMP: &str = "__SERVER_TIMESTAMP__";

/// The sentinel as a JSON value, for splicing into write payloads.
pub fn server_timestamp() -> Value {
    Value::String(SERVER_TIMESTAMP.to_string())
}

/// Remote document store capability.
///
/// Documents are opaque JSON objects. Implementations inject the document
/// key as an `id` field into everything they return, and normalize stored
/// timestamps to RFC 3339 strings.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every document in a collection. An unknown collection is an
    /// empty snapshot, not an error.
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Add a document under a store-generated key; returns the new id.
    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Write a document at an explicit key, creating or replacing it.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Merge fields into an existing document. Fails with
    /// [`StoreError::MissingDocument`] (or a 404) when the document is absent.
    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Delete a document. Deleting an absent document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Delete several documents as one atomic batch commit.
    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), StoreError>;

    /// Open a snapshot subscription on a collection.
    ///
    /// The returned subscription already holds a first full snapshot (an
    /// empty collection is a valid snapshot); every later delivery replaces
    /// the previous one wholesale.
    async fn watch(&self, collection: &str) -> Result<Subscription, StoreError>;
}

/// Live snapshot subscription handle.
///
/// Wraps a watch channel, so readers always observe one complete snapshot:
/// replacement is a single channel send with no partial visibility. The
/// optional task is the delivery loop for implementations that poll;
/// closing the subscription aborts it.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Vec<Value>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: watch::Receiver<Vec<Value>>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// The latest delivered snapshot.
    pub fn current(&self) -> Vec<Value> {
        self.rx.borrow().clone()
    }

    /// Wait until a snapshot newer than the last observed one arrives.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// A fresh receiver on the same snapshot channel.
    pub fn receiver(&self) -> watch::Receiver<Vec<Value>> {
        self.rx.clone()
    }

    /// Stop the delivery loop. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Inject the document key into a document body.
pub(crate) fn with_id(id: &str, mut data: Value) -> Value {
    if let Value::Object(ref mut map) = data {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    data
}

/// Normalize structured timestamp fields to RFC 3339 strings.
///
/// Stores that encode instants as `{"seconds": .., "nanos": ..}` objects
/// get them rewritten in place; everything else passes through untouched.
pub(crate) fn normalize_timestamps(doc: &mut Value) {
    let Value::Object(map) = doc else {
        return;
    };
    for value in map.values_mut() {
        let Some(obj) = value.as_object() else {
            continue;
        };
        let (Some(seconds), Some(nanos)) = (
            obj.get("seconds").and_then(Value::as_i64),
            obj.get("nanos").and_then(Value::as_i64),
        ) else {
            continue;
        };
        if let Some(instant) = Utc.timestamp_opt(seconds, nanos as u32).single() {
            *value = Value::String(instant.to_rfc3339());
        }
    }
}
