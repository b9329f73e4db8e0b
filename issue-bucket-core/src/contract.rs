//! # contract: interfaces to the external services the connectors wrap
//!
//! This module defines the traits the core consumes from its collaborators and
//! the plain data types that cross those seams:
//!
//! - [`ObjectStore`]: the capabilities required from an S3-compatible store.
//!   The key-space manager in [`crate::bucket`] is written purely against it.
//! - [`IssueTracker`]: issue search and agile board lookups.
//! - [`QueryService`]: submit a query, read its status, fetch its results.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; `MockObjectStore`,
//!   `MockIssueTracker` and `MockQueryService` are exported behind the default
//!   `test-export-mocks` feature so downstream crates can use them too.
//!
//! ## Implementations
//! - [`crate::tracker::JiraClient`] implements [`IssueTracker`].
//! - The CLI crate implements [`ObjectStore`] over `aws-sdk-s3` and
//!   [`QueryService`] over `aws-sdk-athena`.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, StoreError, TrackerError};

/// One object as returned by a read: body, user metadata and upload time.
/// Built fresh on every read; nothing is cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectRecord {
    pub body: Bytes,
    pub metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Request for a single listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    /// Group keys into common prefixes at this delimiter.
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    /// Upper bound on keys in this page.
    pub max_keys: Option<i32>,
    /// Ask the store to percent-encode keys in the response.
    pub url_encoded: bool,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            ..Self::default()
        }
    }
}

/// An entry in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a listing plus the cursor to the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// `None` when the response carried no contents field at all.
    pub contents: Option<Vec<ListedObject>>,
    pub common_prefixes: Vec<String>,
    pub next_token: Option<String>,
}

/// Capabilities the key-space manager requires from the underlying store.
///
/// Implementations must forward service and transport failures as
/// [`StoreError::Service`] and report absent keys as [`StoreError::NotFound`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, StoreError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), StoreError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Bulk delete of every key in one request.
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<(), StoreError>;

    async fn list_objects(&self, request: ListRequest) -> Result<ListingPage, StoreError>;

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<(), StoreError>;

    /// Last-modified time of an object, without fetching its body.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<DateTime<Utc>, StoreError>;
}

/// An issue as returned by the tracker search API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    /// REST url of the issue.
    #[serde(rename = "self")]
    pub url: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<IssueStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStatus {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Read access to an issue tracker.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Run a JQL search and return every matching issue with all fields.
    async fn search_issues(
        &self,
        jql: &str,
        expand: Option<String>,
    ) -> Result<Vec<Issue>, TrackerError>;

    async fn agile_boards(&self, name: Option<String>) -> Result<Vec<Board>, TrackerError>;

    async fn sprints(&self, board_id: u64) -> Result<Vec<Sprint>, TrackerError>;
}

/// What to run on the query service and where it should write results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub script: String,
    pub database: String,
    pub output_location: String,
}

/// Execution state as reported by the query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Queued,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

/// Tabular query results; `None` cells are SQL nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResults {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit a query and return its execution id.
    async fn start_query(&self, request: QueryRequest) -> Result<String, QueryError>;

    async fn query_status(&self, execution_id: &str) -> Result<ServiceState, QueryError>;

    async fn query_results(&self, execution_id: &str) -> Result<QueryResults, QueryError>;
}
