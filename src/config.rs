//! Configuration Management
//!
//! Persistent provider configuration: where the document store lives,
//! which resources overlay a template collection, and the scoring webhook
//! endpoint.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the document store service
    #[serde(default)]
    pub store_url: Option<String>,
    /// Bearer token for store requests
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Scoring webhook endpoint, if scoring is wired up
    #[serde(default)]
    pub scoring_webhook_url: Option<String>,
    /// Resource names that overlay a template collection
    #[serde(default)]
    pub overlay_resources: Vec<String>,
    /// Watch-loop polling interval for the HTTP store, in seconds
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docmirror").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective store URL (env > config)
    pub fn effective_store_url(&self) -> Option<String> {
        std::env::var("DOCMIRROR_STORE_URL")
            .ok()
            .or_else(|| self.store_url.clone())
    }

    /// Get effective bearer token (env > config)
    pub fn effective_auth_token(&self) -> Option<String> {
        std::env::var("DOCMIRROR_AUTH_TOKEN")
            .ok()
            .or_else(|| self.auth_token.clone())
    }

    /// Get effective webhook endpoint (env > config)
    pub fn effective_webhook_url(&self) -> Option<String> {
        std::env::var("DOCMIRROR_WEBHOOK_URL")
            .ok()
            .or_else(|| self.scoring_webhook_url.clone())
    }

    /// Watch-loop polling interval, defaulting to the HTTP store's
    /// built-in cadence.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(crate::store::http::DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_empty() {
        let config = Config::default();
        assert!(config.store_url.is_none());
        assert!(config.overlay_resources.is_empty());
    }

    #[test]
    fn poll_interval_defaults_when_unset() {
        let config = Config::default();
        assert_eq!(
            config.poll_interval(),
            crate::store::http::DEFAULT_POLL_INTERVAL
        );

        let config = Config {
            poll_interval_secs: Some(1),
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = Config {
            store_url: Some("http://localhost:8085/".to_string()),
            overlay_resources: vec!["surveyAnswersUsers".to_string()],
            ..Config::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(back.store_url.as_deref(), Some("http://localhost:8085/"));
        assert_eq!(back.overlay_resources.len(), 1);
    }
}
