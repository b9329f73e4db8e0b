use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_STORE_ENDPOINT: &str = "https://s3.amazonaws.com";
pub const DEFAULT_QUERY_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_QUERY_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_QUERY_REGION: &str = "eu-west-1";
pub const DEFAULT_TRACKER_ENDPOINT: &str = "http://localhost:8080";

/// Connection settings handed to the store and query clients at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub store_endpoint: String,
    pub query_timeout_seconds: u64,
    pub default_bucket: String,
    #[serde(default = "default_poll_interval_ms")]
    pub query_poll_interval_ms: u64,
    #[serde(default = "default_query_region")]
    pub query_region: String,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_QUERY_POLL_INTERVAL_MS
}

fn default_query_region() -> String {
    DEFAULT_QUERY_REGION.to_string()
}

impl ConnectorConfig {
    pub fn new(default_bucket: impl Into<String>) -> Self {
        Self {
            store_endpoint: DEFAULT_STORE_ENDPOINT.to_string(),
            query_timeout_seconds: DEFAULT_QUERY_TIMEOUT_SECONDS,
            default_bucket: default_bucket.into(),
            query_poll_interval_ms: DEFAULT_QUERY_POLL_INTERVAL_MS,
            query_region: DEFAULT_QUERY_REGION.to_string(),
        }
    }

    /// Local endpoints (e.g. a localstack container) get dummy credentials.
    pub fn is_local_endpoint(&self) -> bool {
        self.store_endpoint.contains("local")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn query_poll_interval(&self) -> Duration {
        Duration::from_millis(self.query_poll_interval_ms)
    }

    pub fn trace_loaded(&self) {
        info!(
            store_endpoint = %self.store_endpoint,
            default_bucket = %self.default_bucket,
            query_timeout_seconds = self.query_timeout_seconds,
            "Loaded ConnectorConfig"
        );
        debug!(?self, "ConnectorConfig loaded (full debug)");
    }
}

/// Issue tracker endpoint and basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_local_endpoints() {
        let mut config = ConnectorConfig::new("bucket");
        assert!(!config.is_local_endpoint());
        config.store_endpoint = "http://localhost:4566".into();
        assert!(config.is_local_endpoint());
    }

    #[test]
    fn tracker_debug_output_hides_password() {
        let config = TrackerConfig {
            endpoint: DEFAULT_TRACKER_ENDPOINT.into(),
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("admin"));
    }
}
