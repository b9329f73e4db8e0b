//! High-level pipeline: extract issues from the tracker and land them in the bucket.
//!
//! This module provides the orchestration that the CLI's `extract` command runs:
//!   - Searches the issue tracker with the configured JQL
//!   - Flattens each issue into an [`IssueRow`] (id, key, url, description, status, summary)
//!   - Writes the rows as a CSV file into the local working directory
//!   - Uploads that file under the configured upload prefix of the bucket
//!   - Lists the upload prefix so the report shows what the bucket now holds
//!
//! # Responsibilities
//! - Fail-fast orchestration: the first failing step returns its [`ExtractError`]
//! - Every step is traced with a `[EXTRACT]` prefix and the run id
//! - No step is retried; an upload failure leaves the local CSV in place
//!
//! # Navigation
//! - Main entrypoint: [`extract_issues`]
//! - Supporting types: [`ExtractConfig`], [`ExtractReport`]

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::bucket::{Bucket, ListOptions};
use crate::contract::{Issue, IssueTracker, ObjectStore};
use crate::error::{ExtractError, FileError};
use crate::files::FileConnector;
use crate::keyspace;

pub const DEFAULT_JQL: &str = "project = Testing";
pub const DEFAULT_WORKING_DIR: &str = "./static";
pub const DEFAULT_FILE_NAME: &str = "issues.csv";
pub const DEFAULT_UPLOAD_PREFIX: &str = "Uploads";

/// What to extract and where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub jql: String,
    pub working_dir: PathBuf,
    pub file_name: String,
    pub upload_prefix: String,
    /// Land the file in another bucket than the connector's default.
    #[serde(default)]
    pub destination_bucket: Option<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            jql: DEFAULT_JQL.to_string(),
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            file_name: DEFAULT_FILE_NAME.to_string(),
            upload_prefix: DEFAULT_UPLOAD_PREFIX.to_string(),
            destination_bucket: None,
        }
    }
}

/// One issue flattened to the columns written to the extract file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueRow {
    pub id: String,
    pub key: String,
    pub url: String,
    pub description: String,
    pub status: String,
    pub summary: String,
}

impl From<Issue> for IssueRow {
    fn from(issue: Issue) -> Self {
        let fields = issue.fields;
        IssueRow {
            id: issue.id,
            key: issue.key,
            url: issue.url,
            description: fields.description.unwrap_or_default(),
            status: fields.status.map(|s| s.name).unwrap_or_default(),
            summary: fields.summary.unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
pub struct ExtractReport {
    pub run_id: Uuid,
    pub issue_count: usize,
    /// Set when issues were found and written.
    pub local_file: Option<PathBuf>,
    pub uploaded_key: Option<String>,
    /// Keys under the upload prefix after the run.
    pub listed_keys: Vec<String>,
}

pub async fn extract_issues<T, S>(
    config: &ExtractConfig,
    tracker: &T,
    files: &FileConnector,
    bucket: &Bucket<S>,
) -> Result<ExtractReport, ExtractError>
where
    T: IssueTracker,
    S: ObjectStore,
{
    let run_id = Uuid::new_v4();
    info!(%run_id, jql = %config.jql, "[EXTRACT] Starting issue extraction");

    // --- Step 1: Search ---
    let issues = tracker
        .search_issues(&config.jql, None)
        .await
        .map_err(|e| {
            error!(%run_id, error = %e, "[EXTRACT][ERROR] Issue search failed");
            e
        })?;
    let rows: Vec<IssueRow> = issues.into_iter().map(IssueRow::from).collect();
    let issue_count = rows.len();
    info!(%run_id, issues = issue_count, "[EXTRACT] Issue search succeeded");

    // --- Step 2 + 3: Save and upload, only when there is something to land ---
    let mut local_file = None;
    let mut uploaded_key = None;
    if rows.is_empty() {
        info!(%run_id, "[EXTRACT] No issues matched, skipping file and upload");
    } else {
        let path = write_csv_off_runtime(files, rows, &config.file_name)
            .await
            .map_err(|e| {
                error!(%run_id, error = %e, "[EXTRACT][ERROR] Writing CSV failed");
                e
            })?;
        info!(%run_id, path = %path.display(), "[EXTRACT] Wrote extract file");

        let key = keyspace::join_key(&config.upload_prefix, &config.file_name);
        bucket
            .upload_file(&path, config.destination_bucket.as_deref(), &key)
            .await
            .map_err(|e| {
                error!(%run_id, key = %key, error = %e, "[EXTRACT][ERROR] Upload failed");
                e
            })?;
        info!(%run_id, key = %key, "[EXTRACT] Uploaded extract file");

        local_file = Some(path);
        uploaded_key = Some(key);
    }

    // --- Step 4: List what the upload prefix now holds ---
    let listing = bucket
        .list_keys(&config.upload_prefix, &ListOptions::default())
        .await?;
    for key in &listing.keys {
        info!(%run_id, key = %key, "[EXTRACT] Upload prefix holds key");
    }

    Ok(ExtractReport {
        run_id,
        issue_count,
        local_file,
        uploaded_key,
        listed_keys: listing.keys,
    })
}

/// Run the blocking CSV writer on tokio's blocking pool.
async fn write_csv_off_runtime(
    files: &FileConnector,
    rows: Vec<IssueRow>,
    file_name: &str,
) -> Result<PathBuf, FileError> {
    let writer = files.clone();
    let name = file_name.to_string();
    tokio::task::spawn_blocking(move || writer.save_csv(&rows, &name))
        .await
        .map_err(|join| FileError::Io {
            path: files.path_of(file_name),
            source: std::io::Error::other(join),
        })?
}
