//! Error types for the data provider and the document store capability.

use thiserror::Error;

/// Errors surfaced by the CRUD provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named resource has never been initialized in the registry.
    #[error("no resource registered under \"{0}\"")]
    ResourceNotFound(String),

    /// No record matched the requested id.
    #[error("no record found matching id: {0}")]
    NotFound(String),

    /// The operation requires a signed-in principal and none is present.
    #[error("operation requires an authenticated principal")]
    Unauthenticated,

    /// The remote document store rejected or failed a call.
    #[error("remote store failure")]
    Store(#[from] StoreError),

    /// The provider was constructed from an unusable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors from a [`DocumentStore`](crate::store::DocumentStore) implementation.
///
/// The original cause is always preserved so callers can tell "not found"
/// apart from "store unreachable".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connection, TLS, timeout).
    #[error("store request failed")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store request failed: {status} on {collection}")]
    Api {
        status: u16,
        collection: String,
        message: String,
    },

    /// The store's response body was not the expected JSON shape.
    #[error("failed to decode store response for {collection}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    /// An update targeted a document that does not exist.
    #[error("document \"{id}\" not found in collection \"{collection}\"")]
    MissingDocument { collection: String, id: String },
}

impl StoreError {
    /// True when the failure means the target document is absent rather
    /// than the store being unreachable.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            StoreError::MissingDocument { .. } | StoreError::Api { status: 404, .. }
        )
    }
}
