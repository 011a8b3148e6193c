//! Scoring webhook
//!
//! Outbound notification poked by certain update paths. The call is
//! fire-and-forget: the response body is never consumed, and a failure is
//! logged but never fails the surrounding write.

use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::error::StoreError;

/// Client for the external scoring endpoint.
#[derive(Clone)]
pub struct ScoringWebhook {
    client: Client,
    endpoint: Url,
}

impl ScoringWebhook {
    pub fn new(endpoint: Url) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("docmirror/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    /// POST `{source, id}` to the scoring endpoint.
    ///
    /// Returns any transport or status failure so the caller can log it;
    /// callers must not let it abort their write.
    pub async fn notify(&self, source: &str, principal_uid: &str) -> Result<(), StoreError> {
        tracing::debug!("POST {} [source: {}]", self.endpoint, source);

        let body = json!({
            "source": source,
            "id": principal_uid,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                collection: source.to_string(),
                message: "scoring webhook rejected the notification".to_string(),
            });
        }

        Ok(())
    }
}
