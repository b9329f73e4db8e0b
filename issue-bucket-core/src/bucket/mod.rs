//! Bucket: a flat object store seen as a hierarchical filesystem.
//!
//! [`Bucket`] binds one bucket name to an [`ObjectStore`] and layers the
//! key-space model on top of it:
//!
//! - object access (this module): get/put/delete single objects, existence
//!   checks, metadata and timestamps, JSON helpers, folder markers
//! - [`enumerate`]: paginated listings and per-folder statistics
//! - [`transfer`]: copy and move of keys and folders, bulk deletion
//!
//! Calls are issued one at a time; the bucket keeps no mutable state beyond the
//! store handle, so independent buckets can be driven in parallel by callers.
//!
//! Single-object reads return `Ok(None)` when the key is absent and `Err` for
//! any other failure; every other operation passes store failures through.

pub mod enumerate;
pub mod transfer;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::contract::{ListRequest, ObjectRecord, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::keyspace;

pub use enumerate::{
    folders_with_multiple_files, FolderStats, KeyListing, ListOptions, TimestampedKey, PAGE_SIZE,
};
pub use transfer::TransferOptions;

/// A named bucket on an object store.
#[derive(Debug)]
pub struct Bucket<S> {
    store: S,
    name: String,
    base_uri: String,
}

impl<S: ObjectStore> Bucket<S> {
    pub fn new(store: S, name: impl Into<String>) -> Self {
        let name = name.into();
        let base_uri = keyspace::bucket_base_uri(&name);
        Self {
            store,
            name,
            base_uri,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `s3a://{name}/`
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Full object record, or `None` if the key does not exist.
    pub async fn get_record(&self, key: &str) -> StoreResult<Option<ObjectRecord>> {
        match self.store.get_object(&self.name, key).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => {
                debug!(bucket = %self.name, key, "Object not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_object(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.get_record(key).await?.map(|record| record.body))
    }

    /// Body and upload time. Objects the store reports without a timestamp
    /// are returned with the Unix epoch.
    pub async fn get_object_with_timestamp(
        &self,
        key: &str,
    ) -> StoreResult<Option<(Bytes, DateTime<Utc>)>> {
        Ok(self.get_record(key).await?.map(|record| {
            let modified = record.last_modified.unwrap_or(DateTime::UNIX_EPOCH);
            (record.body, modified)
        }))
    }

    pub async fn get_object_with_metadata(
        &self,
        key: &str,
    ) -> StoreResult<Option<(Bytes, HashMap<String, String>)>> {
        Ok(self
            .get_record(key)
            .await?
            .map(|record| (record.body, record.metadata)))
    }

    pub async fn get_object_metadata(
        &self,
        key: &str,
    ) -> StoreResult<Option<HashMap<String, String>>> {
        Ok(self.get_record(key).await?.map(|record| record.metadata))
    }

    pub async fn put_object(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        metadata: Option<HashMap<String, String>>,
    ) -> StoreResult<()> {
        let body = body.into();
        debug!(bucket = %self.name, key, size = body.len(), "Putting object");
        self.store
            .put_object(&self.name, key, body, metadata.filter(|m| !m.is_empty()))
            .await
    }

    /// Upload a local file, to this bucket unless `destination_bucket` is given.
    pub async fn upload_file(
        &self,
        path: &Path,
        destination_bucket: Option<&str>,
        key: &str,
    ) -> StoreResult<()> {
        let bucket = destination_bucket
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.name);
        let body = tokio::fs::read(path).await?;
        info!(
            path = %path.display(),
            bucket,
            key,
            size = body.len(),
            "Uploading file"
        );
        self.store
            .put_object(bucket, key, Bytes::from(body), None)
            .await
    }

    /// Download an object to a local file and return the file path.
    pub async fn download(&self, key: &str, path: impl Into<PathBuf>) -> StoreResult<PathBuf> {
        let path = path.into();
        let record = self.store.get_object(&self.name, key).await?;
        tokio::fs::write(&path, &record.body).await?;
        info!(key, path = %path.display(), size = record.body.len(), "Downloaded object");
        Ok(path)
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_object(key).await? {
            Some(body) => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T, key: &str) -> StoreResult<()> {
        let body = serde_json::to_vec(value).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.put_object(key, body, None).await
    }

    /// Create an empty folder-marker object (`key` gets a trailing delimiter).
    pub async fn create_folder(&self, key: &str) -> StoreResult<()> {
        let marker = keyspace::folder_prefix(key);
        info!(bucket = %self.name, key = %marker, "Creating folder marker");
        self.put_object(&marker, Bytes::new(), None).await
    }

    /// Create a folder marker at `location` unless it already exists.
    ///
    /// `location` may be a full `s3a://bucket/...` path or start with the
    /// bucket name. Locations not ending in the delimiter are ignored.
    pub async fn create_directory_if_not_exists(&self, location: &str) -> StoreResult<bool> {
        let relative = self.trim_bucket_base(location);
        let bucket_folder = keyspace::folder_prefix(&self.name);
        let relative = relative
            .strip_prefix(bucket_folder.as_str())
            .unwrap_or(relative);
        if !keyspace::is_folder_marker(relative) || self.get_object(relative).await?.is_some() {
            return Ok(false);
        }
        self.put_object(relative, Bytes::new(), None).await?;
        info!(bucket = %self.name, key = relative, "Created directory marker");
        Ok(true)
    }

    /// Bucket-relative key for a full `s3a://bucket/...` path.
    pub fn trim_bucket_base<'a>(&self, path: &'a str) -> &'a str {
        keyspace::trim_bucket_base(path, &self.base_uri)
    }

    /// Whether any key starts with `prefix` (a file or a folder).
    pub async fn key_exists(&self, prefix: &str) -> StoreResult<bool> {
        let request = ListRequest {
            max_keys: Some(1),
            ..ListRequest::new(&self.name, prefix)
        };
        let page = self.store.list_objects(request).await?;
        let exists = page.contents.is_some_and(|contents| !contents.is_empty());
        if exists {
            info!(bucket = %self.name, key = prefix, "Key exists");
        } else {
            info!(bucket = %self.name, key = prefix, "Key does not exist");
        }
        Ok(exists)
    }

    pub async fn folder_exists(&self, prefix: &str) -> StoreResult<bool> {
        self.key_exists(prefix).await
    }

    /// `[key]` when the object was last modified more than `days` days ago,
    /// otherwise empty. An age too large to express as a timestamp matches
    /// nothing.
    pub async fn keys_older_than(&self, key: &str, days: i64) -> StoreResult<Vec<String>> {
        let Some(cutoff) = Duration::try_days(days).and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            warn!(bucket = %self.name, key, days, "Age out of range, nothing is that old");
            return Ok(Vec::new());
        };
        let modified = self.store.head_object(&self.name, key).await?;
        if modified < cutoff {
            Ok(vec![key.to_string()])
        } else {
            Ok(Vec::new())
        }
    }
}
