//! `load_config` module: Loads a static YAML config and injects tracker secrets from the environment.
//!
//! This module is the only place where untrusted YAML is parsed and mapped to the typed
//! configuration structs of `issue-bucket-core`.
//!
//! # Accepted YAML
//! ```yaml
//! store:
//!   endpoint: http://localhost:4566   # optional, defaults to AWS S3
//!   default_bucket: data-lake
//! query:                              # optional
//!   timeout_seconds: 30
//!   poll_interval_ms: 500
//!   region: eu-west-1
//! tracker:                            # optional
//!   endpoint: http://localhost:8080
//! extract:                            # optional, see ExtractConfig
//!   jql: project = Testing
//!   upload_prefix: Uploads
//! ```
//!
//! Tracker credentials never live in the file: they come from `JIRA_USERNAME` and
//! `JIRA_PASSWORD` (a `.env` file is honoured by the binary), both defaulting to `admin`.

use anyhow::Result;
use issue_bucket_core::config::{
    ConnectorConfig, TrackerConfig, DEFAULT_QUERY_POLL_INTERVAL_MS, DEFAULT_QUERY_REGION,
    DEFAULT_QUERY_TIMEOUT_SECONDS, DEFAULT_STORE_ENDPOINT, DEFAULT_TRACKER_ENDPOINT,
};
use issue_bucket_core::extract::ExtractConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const USERNAME_VAR: &str = "JIRA_USERNAME";
pub const PASSWORD_VAR: &str = "JIRA_PASSWORD";
const DEFAULT_CREDENTIAL: &str = "admin";

/// Everything a CLI command needs, fully resolved.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub connector: ConnectorConfig,
    pub tracker: TrackerConfig,
    pub extract: ExtractConfig,
}

#[derive(Debug, Deserialize)]
struct StoreSection {
    #[serde(default = "default_store_endpoint")]
    endpoint: String,
    default_bucket: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct QuerySection {
    timeout_seconds: u64,
    poll_interval_ms: u64,
    region: String,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_QUERY_TIMEOUT_SECONDS,
            poll_interval_ms: DEFAULT_QUERY_POLL_INTERVAL_MS,
            region: DEFAULT_QUERY_REGION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TrackerSection {
    endpoint: String,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRACKER_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    store: StoreSection,
    #[serde(default)]
    query: QuerySection,
    #[serde(default)]
    tracker: TrackerSection,
    #[serde(default)]
    extract: ExtractSection,
}

/// Like `ExtractConfig`, but every key may be left out.
#[derive(Debug, Default, Deserialize)]
struct ExtractSection {
    jql: Option<String>,
    working_dir: Option<std::path::PathBuf>,
    file_name: Option<String>,
    upload_prefix: Option<String>,
    destination_bucket: Option<String>,
}

impl From<ExtractSection> for ExtractConfig {
    fn from(section: ExtractSection) -> Self {
        let defaults = ExtractConfig::default();
        ExtractConfig {
            jql: section.jql.unwrap_or(defaults.jql),
            working_dir: section.working_dir.unwrap_or(defaults.working_dir),
            file_name: section.file_name.unwrap_or(defaults.file_name),
            upload_prefix: section.upload_prefix.unwrap_or(defaults.upload_prefix),
            destination_bucket: section.destination_bucket,
        }
    }
}

fn default_store_endpoint() -> String {
    DEFAULT_STORE_ENDPOINT.to_string()
}

fn credential(var: &str) -> String {
    match env::var(var) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            info!(var, "Credential not set in environment, using default");
            DEFAULT_CREDENTIAL.to_string()
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects tracker credentials from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.store.default_bucket.trim().is_empty() {
        error!(config_path = ?path_ref, "store.default_bucket is empty");
        return Err(anyhow::anyhow!("store.default_bucket must not be empty"));
    }

    let connector = ConnectorConfig {
        store_endpoint: raw.store.endpoint,
        query_timeout_seconds: raw.query.timeout_seconds,
        default_bucket: raw.store.default_bucket,
        query_poll_interval_ms: raw.query.poll_interval_ms,
        query_region: raw.query.region,
    };
    connector.trace_loaded();

    let tracker = TrackerConfig {
        endpoint: raw.tracker.endpoint,
        username: credential(USERNAME_VAR),
        password: credential(PASSWORD_VAR),
    };

    Ok(AppConfig {
        connector,
        tracker,
        extract: raw.extract.into(),
    })
}
