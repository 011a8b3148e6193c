//! CRUD orchestrator
//!
//! Implements the operation surface consumed by the admin front-end:
//! list/get reads answered from the resource mirrors through the query
//! engine, writes issued straight to the document store. Writes never wait
//! for the mirror to catch up; the next snapshot delivery folds them in.
//!
//! A family of "overlay" resources gets special treatment: each stores the
//! current principal's per-record overrides of a template collection, and
//! reads merge the two (see [`ResourceKind::UserOverlay`]).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use crate::config::Config;
use crate::error::ProviderError;
use crate::identity::{IdentityProvider, Principal};
use crate::mirror::{ResourceKind, ResourceMirror};
use crate::query::{filter_records, match_field, paginate, sort_records, Filter, Pagination, Sort};
use crate::registry::ResourceRegistry;
use crate::store::{server_timestamp, with_id, DocumentStore};
use crate::webhook::ScoringWebhook;

/// Parameters of a list request.
#[derive(Debug, Clone, Default)]
pub struct GetListParams {
    pub sort: Option<Sort>,
    pub filter: Filter,
    pub pagination: Option<Pagination>,
}

/// Parameters of a reference lookup: records whose `target` field equals
/// `value`, exactly.
#[derive(Debug, Clone)]
pub struct GetManyReferenceParams {
    pub target: String,
    pub value: Value,
    pub sort: Option<Sort>,
    pub pagination: Option<Pagination>,
}

/// A page of records plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: usize,
}

/// The data provider: one instance per store/identity pair, owning its
/// own registry of resource mirrors.
pub struct DataProvider {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    registry: ResourceRegistry,
    webhook: Option<ScoringWebhook>,
}

impl DataProvider {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &Config,
    ) -> Result<Self, ProviderError> {
        let registry =
            ResourceRegistry::new(Arc::clone(&store), config.overlay_resources.iter().cloned());

        let webhook = match config.effective_webhook_url() {
            Some(raw) => {
                let endpoint = Url::parse(&raw)
                    .map_err(|e| ProviderError::Config(format!("webhook url: {e}")))?;
                Some(ScoringWebhook::new(endpoint)?)
            }
            None => None,
        };

        Ok(Self {
            store,
            identity,
            registry,
            webhook,
        })
    }

    /// The live mirror behind a resource, initializing it if needed.
    pub async fn resource(&self, name: &str) -> Result<Arc<ResourceMirror>, ProviderError> {
        self.registry.init_resource(name).await
    }

    /// Close every mirror subscription. The provider keeps answering reads
    /// from the last snapshots but receives no further deliveries.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    fn require_principal(&self) -> Result<Principal, ProviderError> {
        self.identity
            .current()
            .ok_or(ProviderError::Unauthenticated)
    }

    /// Fire the scoring webhook. Failures are logged and swallowed: a
    /// scoring refresh must never fail the write it rides on.
    async fn notify_scoring(&self, resource: &str, principal: &Principal) {
        let Some(ref webhook) = self.webhook else {
            return;
        };
        if let Err(err) = webhook.notify(resource, &principal.uid).await {
            tracing::warn!("scoring webhook for \"{}\" failed: {}", resource, err);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_list(
        &self,
        resource: &str,
        params: GetListParams,
    ) -> Result<ListResult, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;

        let mut records = mirror.records();
        let sort = params.sort.clone().unwrap_or_default();
        sort_records(&mut records, &sort);

        let filtered = match mirror.kind() {
            ResourceKind::Plain => filter_records(&records, &params.filter),
            ResourceKind::UserOverlay { template } => {
                self.overlay_list(&records, template, &params.filter)
                    .await?
            }
        };

        let (data, total) = paginate(filtered, params.pagination);
        Ok(ListResult { data, total })
    }

    /// The overlay merge: the principal's own published overlay records,
    /// followed by published template records nobody has overlaid yet,
    /// each synthesized with `questionId` pointing back at the template.
    async fn overlay_list(
        &self,
        records: &[Value],
        template: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>, ProviderError> {
        let principal = self.require_principal()?;

        let own: Vec<Value> = filter_records(records, filter)
            .into_iter()
            .filter(|record| {
                record.get("createdByUid").and_then(Value::as_str) == Some(principal.uid.as_str())
                    && is_published(record)
            })
            .collect();

        let template_docs = self.store.get_all(template).await?;
        let published_templates = filter_records(&template_docs, filter)
            .into_iter()
            .filter(is_published);

        let mut merged = own.clone();
        for template_doc in published_templates {
            let template_id = template_doc
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let overlaid = own
                .iter()
                .any(|record| record.get("questionId").and_then(Value::as_str) == Some(&*template_id));
            if !overlaid {
                merged.push(tag_question_id(template_doc, &template_id));
            }
        }
        Ok(merged)
    }

    pub async fn get_one(&self, resource: &str, id: Option<&str>) -> Result<Value, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;
        let requested = id.unwrap_or_default();

        let matches: Vec<Value> = match mirror.kind() {
            // Overlay lookups always read fresh: a just-written overlay
            // must be visible before the mirror catches up.
            ResourceKind::UserOverlay { template } => {
                let fresh = self.store.get_all(resource).await?;
                let found: Vec<Value> = records_with_id(fresh, requested);
                if !found.is_empty() {
                    found
                } else {
                    let templates = self.store.get_all(template).await?;
                    records_with_id(templates, requested)
                        .into_iter()
                        .map(|doc| tag_question_id(doc, requested))
                        .collect()
                }
            }
            ResourceKind::Plain => {
                if resource == "users" && id.is_none() {
                    // The caller means "my own record".
                    let principal = self.require_principal()?;
                    records_with_id(mirror.records(), &principal.uid)
                } else if resource == "profile" {
                    // A profile is the principal's users record wearing
                    // the requested id.
                    let principal = self.require_principal()?;
                    let users = self.store.get_all("users").await?;
                    records_with_id(users, &principal.uid)
                        .into_iter()
                        .map(|doc| with_id(requested, doc))
                        .collect()
                } else {
                    records_with_id(mirror.records(), requested)
                }
            }
        };

        matches
            .into_iter()
            .next_back()
            .ok_or_else(|| ProviderError::NotFound(requested.to_string()))
    }

    pub async fn get_many(
        &self,
        resource: &str,
        ids: &[String],
    ) -> Result<Vec<Value>, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let matches = match mirror.kind() {
            ResourceKind::UserOverlay { template } => {
                let fresh = self.store.get_all(resource).await?;
                let matches = records_in_set(fresh, &wanted);
                if !matches.is_empty() {
                    matches
                } else {
                    // None of the requested ids exist as overlays yet;
                    // answer from the template collection instead.
                    let templates = self.store.get_all(template).await?;
                    records_in_set(templates, &wanted)
                }
            }
            ResourceKind::Plain => records_in_set(mirror.records(), &wanted),
        };

        Ok(matches)
    }

    pub async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;

        let mut matches = match mirror.kind() {
            ResourceKind::UserOverlay { template } => {
                let fresh = self.store.get_all(resource).await?;
                let matches = match_field(&fresh, &params.target, &params.value);
                if !matches.is_empty() {
                    matches
                } else {
                    let templates = self.store.get_all(template).await?;
                    match_field(&templates, &params.target, &params.value)
                }
            }
            ResourceKind::Plain => match_field(&mirror.records(), &params.target, &params.value),
        };

        if let Some(ref sort) = params.sort {
            sort_records(&mut matches, sort);
        }

        let (data, total) = paginate(matches, params.pagination);
        Ok(ListResult { data, total })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn create(&self, resource: &str, data: Value) -> Result<Value, ProviderError> {
        self.registry.init_resource(resource).await?;
        let principal = self.require_principal()?;

        let mut data = data;
        // An explicit key travels as a `myId` field and is lower-cased;
        // it never lands in the stored document.
        let explicit_id = match data {
            Value::Object(ref mut map) => map
                .remove("myId")
                .and_then(|v| v.as_str().map(str::to_lowercase)),
            _ => None,
        };

        let mut payload = data.clone();
        stamp_create(&mut payload, &principal);

        let id = match explicit_id {
            // Last set wins on a key collision; there is no existence check.
            Some(id) => {
                self.store.set(resource, &id, payload).await?;
                id
            }
            None => self.store.add(resource, payload).await?,
        };

        Ok(with_id(&id, data))
    }

    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;
        let principal = self.require_principal()?;

        let mut data = data;
        strip_id(&mut data);

        match mirror.kind() {
            ResourceKind::UserOverlay { .. } => {
                let exists = mirror
                    .records()
                    .iter()
                    .any(|record| record.get("id").and_then(Value::as_str) == Some(id));

                if exists {
                    let mut payload = data.clone();
                    stamp_update(&mut payload, &principal);
                    self.store.update(resource, id, payload).await?;
                } else {
                    // No overlay yet: degrade to create, pointing the new
                    // record at the template entry it overrides.
                    if let Value::Object(ref mut map) = data {
                        map.insert("questionId".to_string(), Value::String(id.to_string()));
                    }
                    let mut payload = data.clone();
                    stamp_create(&mut payload, &principal);
                    self.store.add(resource, payload).await?;
                }

                self.notify_scoring(resource, &principal).await;
                Ok(with_id(id, data))
            }
            ResourceKind::Plain => {
                let mut payload = data;
                stamp_update(&mut payload, &principal);

                if resource == "profile" {
                    // Profile edits land on the principal's users record.
                    self.store
                        .update("users", &principal.uid, payload.clone())
                        .await?;
                } else if resource == "users" {
                    self.notify_scoring(resource, &principal).await;
                    self.store.update(resource, id, payload.clone()).await?;
                } else {
                    self.store.update(resource, id, payload.clone()).await?;
                }

                Ok(with_id(id, payload))
            }
        }
    }

    /// Per-id application of [`update`](Self::update)'s branching. Writes
    /// are sequential and non-atomic: a mid-loop failure leaves earlier
    /// ids updated and later ones untouched.
    pub async fn update_many(
        &self,
        resource: &str,
        ids: &[String],
        data: Value,
    ) -> Result<Vec<Value>, ProviderError> {
        let mirror = self.registry.init_resource(resource).await?;
        let principal = self.require_principal()?;

        let mut data = data;
        strip_id(&mut data);

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match mirror.kind() {
                ResourceKind::UserOverlay { .. } => {
                    let exists = mirror
                        .records()
                        .iter()
                        .any(|record| record.get("id").and_then(Value::as_str) == Some(id.as_str()));

                    if exists {
                        let mut payload = data.clone();
                        stamp_update(&mut payload, &principal);
                        self.store.update(resource, id, payload).await?;
                    } else {
                        let mut payload = data.clone();
                        if let Value::Object(ref mut map) = payload {
                            map.insert("questionId".to_string(), Value::String(id.clone()));
                        }
                        stamp_create(&mut payload, &principal);
                        self.store.add(resource, payload).await?;
                    }
                }
                ResourceKind::Plain => {
                    let mut payload = data.clone();
                    stamp_update(&mut payload, &principal);
                    self.store.update(resource, id, payload).await?;
                }
            }
            results.push(with_id(id, data.clone()));
        }

        Ok(results)
    }

    /// Delete by id, echoing the caller-supplied previous data without a
    /// confirmation read.
    pub async fn delete(
        &self,
        resource: &str,
        id: &str,
        previous_data: Value,
    ) -> Result<Value, ProviderError> {
        self.registry.init_resource(resource).await?;
        self.store.delete(resource, id).await?;
        Ok(previous_data)
    }

    /// The one multi-document operation with atomicity: all ids go in a
    /// single batch commit.
    pub async fn delete_many(
        &self,
        resource: &str,
        ids: &[String],
    ) -> Result<Vec<Value>, ProviderError> {
        self.registry.init_resource(resource).await?;
        self.store.delete_many(resource, ids).await?;
        Ok(ids.iter().map(|id| json!({ "id": id })).collect())
    }
}

// =============================================================================
// Record helpers
// =============================================================================

fn is_published(record: &Value) -> bool {
    record.get("published").and_then(Value::as_bool) == Some(true)
}

fn records_with_id(records: Vec<Value>, id: &str) -> Vec<Value> {
    records
        .into_iter()
        .filter(|record| record.get("id").and_then(Value::as_str) == Some(id))
        .collect()
}

fn records_in_set(records: Vec<Value>, ids: &HashSet<&str>) -> Vec<Value> {
    records
        .into_iter()
        .filter(|record| {
            record
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| ids.contains(id))
        })
        .collect()
}

fn tag_question_id(mut doc: Value, template_id: &str) -> Value {
    if let Value::Object(ref mut map) = doc {
        map.insert(
            "questionId".to_string(),
            Value::String(template_id.to_string()),
        );
    }
    doc
}

fn strip_id(data: &mut Value) {
    if let Value::Object(map) = data {
        map.remove("id");
    }
}

/// Full provenance for a freshly created document.
fn stamp_create(data: &mut Value, principal: &Principal) {
    let Value::Object(map) = data else {
        return;
    };
    map.insert("createdate".to_string(), server_timestamp());
    map.insert("lastupdate".to_string(), server_timestamp());
    map.insert(
        "createdByUid".to_string(),
        Value::String(principal.uid.clone()),
    );
    map.insert(
        "updatedByUid".to_string(),
        Value::String(principal.uid.clone()),
    );
    map.insert(
        "createdByEmail".to_string(),
        Value::String(principal.email.clone()),
    );
    map.insert(
        "updatedByEmail".to_string(),
        Value::String(principal.email.clone()),
    );
}

/// Update-side provenance; creation fields stay untouched.
fn stamp_update(data: &mut Value, principal: &Principal) {
    let Value::Object(map) = data else {
        return;
    };
    map.insert("lastupdate".to_string(), server_timestamp());
    map.insert(
        "updatedByUid".to_string(),
        Value::String(principal.uid.clone()),
    );
    map.insert(
        "updatedByEmail".to_string(),
        Value::String(principal.email.clone()),
    );
}
