//! docmirror - CRUD data provider over a realtime-mirrored document store
//!
//! An admin front-end speaks CRUD; a remote document database speaks
//! collections, documents, and snapshot subscriptions. This crate sits in
//! between: each resource's collection is mirrored into memory through a
//! live subscription, list and lookup requests are answered from that
//! mirror via a small query engine, and writes go straight to the store
//! (the mirror folds them in on the next snapshot).
//!
//! # Architecture
//!
//! - [`query`] - pure sort/filter/paginate over record lists
//! - [`mirror`] - per-resource snapshot cache fed by a store subscription
//! - [`registry`] - resource name to mirror mapping, owned per provider
//! - [`provider`] - the CRUD operation surface, including the
//!   template/overlay merge for per-user resources
//! - [`store`] - the document store capability (HTTP and in-memory)
//! - [`identity`] / [`webhook`] - consumed collaborators
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docmirror::{Config, DataProvider, MemoryStore, Principal, StaticIdentity};
//!
//! async fn list_posts() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let identity = Arc::new(StaticIdentity::new(Principal::new("u1", "u1@example.com")));
//!     let provider = DataProvider::new(store, identity, &Config::default())?;
//!     let page = provider.get_list("posts", Default::default()).await?;
//!     println!("{} posts", page.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod mirror;
pub mod provider;
pub mod query;
pub mod registry;
pub mod store;
pub mod webhook;

pub use config::Config;
pub use error::{ProviderError, StoreError};
pub use identity::{IdentityProvider, Principal, SessionIdentity, StaticIdentity};
pub use mirror::{ResourceKind, ResourceMirror};
pub use provider::{DataProvider, GetListParams, GetManyReferenceParams, ListResult};
pub use query::{Filter, Pagination, Sort, SortOrder};
pub use registry::ResourceRegistry;
pub use store::{DocumentStore, HttpStore, MemoryStore};
pub use webhook::ScoringWebhook;

/// Version injected at compile time via DOCMIRROR_VERSION env var (set by
/// CI/CD), or "dev" for local builds.
pub const VERSION: &str = match option_env!("DOCMIRROR_VERSION") {
    Some(v) => v,
    None => "dev",
};
