//! HTTP document store
//!
//! REST client for a remote document store service. Collections live under
//! `{base}/collections/{name}`, documents under
//! `{base}/collections/{name}/{id}`, and the atomic batch delete at
//! `{base}/collections/{name}:batchDelete`. The service resolves the
//! server-timestamp sentinel when a write lands.

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::sync::watch;
use url::Url;

use async_trait::async_trait;

use super::{normalize_timestamps, with_id, DocumentStore, Subscription};
use crate::error::StoreError;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// How often the watch loop re-reads a collection when not configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Sanitize response body for logging
/// Truncates long responses and masks non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// REST-backed [`DocumentStore`].
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
    token: Option<String>,
    poll_interval: Duration,
}

impl HttpStore {
    pub fn new(base: Url, token: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("docmirror/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            token,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override the watch loop's polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}collections/{}", self.base, collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}collections/{}/{}", self.base, collection, id)
    }

    fn batch_delete_url(&self, collection: &str) -> String {
        format!("{}collections/{}:batchDelete", self.base, collection)
    }

    /// Issue one request and parse the response body as JSON.
    ///
    /// Non-success statuses log a sanitized body and map to a typed error
    /// carrying the status, so callers can tell 404 from unreachable.
    async fn request(
        &self,
        method: Method,
        url: &str,
        collection: &str,
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("store API error: {} - {}", status, sanitize_for_log(&text));
            return Err(StoreError::Api {
                status: status.as_u16(),
                collection: collection.to_string(),
                message: sanitize_for_log(&text),
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| StoreError::Decode {
            collection: collection.to_string(),
            source,
        })
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let url = self.collection_url(collection);
        let response = match self.request(Method::GET, &url, collection, None).await {
            Ok(response) => response,
            // A collection nobody has written to yet is an empty snapshot.
            Err(ref err) if err.is_missing() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let documents = response
            .get("documents")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(documents
            .into_iter()
            .map(|mut doc| {
                normalize_timestamps(&mut doc);
                let id = doc
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                with_id(&id, doc)
            })
            .collect())
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let url = self.collection_url(collection);
        let response = self
            .request(Method::POST, &url, collection, Some(&data))
            .await?;

        response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::Api {
                status: 200,
                collection: collection.to_string(),
                message: "add response carried no document id".to_string(),
            })
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        self.request(Method::PUT, &url, collection, Some(&data))
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        match self
            .request(Method::PATCH, &url, collection, Some(&data))
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_missing() => Err(StoreError::MissingDocument {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        match self.request(Method::DELETE, &url, collection, None).await {
            Ok(_) => Ok(()),
            // Deleting an absent document is a no-op.
            Err(ref err) if err.is_missing() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn delete_many(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let url = self.batch_delete_url(collection);
        let body = json!({ "ids": ids });
        self.request(Method::POST, &url, collection, Some(&body))
            .await?;
        Ok(())
    }

    async fn watch(&self, collection: &str) -> Result<Subscription, StoreError> {
        let initial = self.get_all(collection).await?;
        let (sender, rx) = watch::channel(initial);

        let store = self.clone();
        let name = collection.to_string();
        let interval = self.poll_interval;
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match store.get_all(&name).await {
                    Ok(snapshot) => {
                        // Full replacement only when something changed; the
                        // channel keeps readers on the previous snapshot
                        // otherwise.
                        sender.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                *current = snapshot;
                                true
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!("watch poll for \"{}\" failed: {}", name, err);
                    }
                }
            }
        });

        Ok(Subscription::new(rx, Some(task)))
    }
}

/// Map a store error to a short operator-facing message.
///
/// Generic wording only; raw API bodies never reach the caller.
pub fn format_store_error(error: &StoreError) -> String {
    match error {
        StoreError::Api { status: 401, .. } => {
            "Authentication failed. Check the configured store token.".to_string()
        }
        StoreError::Api { status: 403, .. } => {
            "Permission denied by the document store.".to_string()
        }
        StoreError::Api { status: 404, .. } | StoreError::MissingDocument { .. } => {
            "Document not found.".to_string()
        }
        StoreError::Api { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        StoreError::Api { status, .. } if *status >= 500 => {
            "Document store temporarily unavailable. Please try again.".to_string()
        }
        StoreError::Api { .. } => "Invalid request. Check your parameters.".to_string(),
        StoreError::Http(_) => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        StoreError::Decode { .. } => "Unexpected response from the document store.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_truncates_and_strips() {
        let long = "x".repeat(300) + "\n\t";
        let clean = sanitize_for_log(&long);
        assert!(clean.contains("truncated"));
        assert!(!clean.contains('\n'));
    }

    #[test]
    fn url_builders_compose_collection_paths() {
        let store = HttpStore::new(Url::parse("http://localhost:8085/").unwrap(), None).unwrap();
        assert_eq!(
            store.document_url("users", "u1"),
            "http://localhost:8085/collections/users/u1"
        );
        assert_eq!(
            store.batch_delete_url("users"),
            "http://localhost:8085/collections/users:batchDelete"
        );
    }

    #[test]
    fn format_store_error_maps_statuses() {
        let err = StoreError::Api {
            status: 401,
            collection: "users".to_string(),
            message: String::new(),
        };
        assert!(format_store_error(&err).contains("Authentication"));
    }
}
