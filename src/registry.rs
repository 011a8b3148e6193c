//! Resource registry
//!
//! Maps resource names to live mirrors. Owned by the provider instance
//! (not process-global), so separate providers never share subscriptions.
//! A resource's kind - plain or user-overlay - is classified exactly once,
//! when its mirror is first initialized.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ProviderError;
use crate::mirror::{ResourceKind, ResourceMirror};
use crate::store::DocumentStore;

/// Suffix that links an overlay resource to its template collection.
const OVERLAY_SUFFIX: &str = "Users";

/// Registry of initialized resource mirrors.
pub struct ResourceRegistry {
    store: Arc<dyn DocumentStore>,
    overlay_resources: HashSet<String>,
    mirrors: RwLock<HashMap<String, Arc<ResourceMirror>>>,
}

impl ResourceRegistry {
    /// `overlay_resources` lists the resource names that overlay a
    /// template collection (name minus the `Users` suffix).
    pub fn new(
        store: Arc<dyn DocumentStore>,
        overlay_resources: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            store,
            overlay_resources: overlay_resources.into_iter().collect(),
            mirrors: RwLock::new(HashMap::new()),
        }
    }

    /// Decide how a resource behaves. Configured overlay names must carry
    /// the `Users` suffix; anything else registers as plain.
    fn classify(&self, name: &str) -> ResourceKind {
        if !self.overlay_resources.contains(name) {
            return ResourceKind::Plain;
        }
        match name.strip_suffix(OVERLAY_SUFFIX) {
            Some(template) if !template.is_empty() => ResourceKind::UserOverlay {
                template: template.to_string(),
            },
            _ => {
                tracing::warn!(
                    "overlay resource \"{}\" lacks the \"{}\" suffix, treating as plain",
                    name,
                    OVERLAY_SUFFIX
                );
                ResourceKind::Plain
            }
        }
    }

    /// Initialize the mirror for a resource, opening its subscription on
    /// first call. Idempotent; later calls return the existing mirror.
    pub async fn init_resource(&self, name: &str) -> Result<Arc<ResourceMirror>, ProviderError> {
        {
            let mirrors = self.mirrors.read().await;
            if let Some(mirror) = mirrors.get(name) {
                return Ok(Arc::clone(mirror));
            }
        }

        // Open the subscription outside the write lock; the first snapshot
        // has arrived by the time watch() returns.
        let subscription = self.store.watch(name).await?;

        let mut mirrors = self.mirrors.write().await;
        if let Some(mirror) = mirrors.get(name) {
            // Lost the race; the extra subscription closes on drop.
            return Ok(Arc::clone(mirror));
        }

        let kind = self.classify(name);
        tracing::debug!("initialized resource \"{}\" as {:?}", name, kind);
        let mirror = Arc::new(ResourceMirror::new(name.to_string(), kind, subscription));
        mirrors.insert(name.to_string(), Arc::clone(&mirror));
        Ok(mirror)
    }

    /// Look up an already-initialized mirror.
    pub async fn get(&self, name: &str) -> Result<Arc<ResourceMirror>, ProviderError> {
        let mirrors = self.mirrors.read().await;
        mirrors
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| ProviderError::ResourceNotFound(name.to_string()))
    }

    /// Close every mirror's subscription. Called on provider teardown so
    /// no live listeners leak across instances or test runs.
    pub async fn shutdown(&self) {
        let mirrors = self.mirrors.read().await;
        for mirror in mirrors.values() {
            mirror.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry_with(overlays: &[&str]) -> ResourceRegistry {
        ResourceRegistry::new(
            Arc::new(MemoryStore::new()),
            overlays.iter().map(|s| s.to_string()),
        )
    }

    #[tokio::test]
    async fn get_before_init_is_resource_not_found() {
        let registry = registry_with(&[]);
        let err = registry.get("posts").await.unwrap_err();
        assert!(matches!(err, ProviderError::ResourceNotFound(name) if name == "posts"));
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let registry = registry_with(&[]);
        let first = registry.init_resource("posts").await.unwrap();
        let second = registry.init_resource("posts").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn overlay_names_classify_against_their_template() {
        let registry = registry_with(&["surveyAnswersUsers"]);
        let overlay = registry.init_resource("surveyAnswersUsers").await.unwrap();
        assert_eq!(overlay.kind().template(), Some("surveyAnswers"));

        let plain = registry.init_resource("surveyAnswers").await.unwrap();
        assert_eq!(*plain.kind(), ResourceKind::Plain);
    }

    #[tokio::test]
    async fn misconfigured_overlay_name_falls_back_to_plain() {
        let registry = registry_with(&["Users"]);
        let mirror = registry.init_resource("Users").await.unwrap();
        assert_eq!(*mirror.kind(), ResourceKind::Plain);
    }
}
