//! Transfer engine: copy and move keys between locations, delete keys and
//! folders.
//!
//! Moves are copy-then-delete per key and never transactional. A failure
//! partway through leaves the keys processed so far at the destination (and,
//! for folder moves, still at the source), which the returned
//! [`TransferError`] reports.

use tracing::{debug, error, info, warn};

use super::enumerate::{ListOptions, PAGE_SIZE};
use super::Bucket;
use crate::contract::ObjectStore;
use crate::error::{StoreResult, TransferError};
use crate::keyspace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Target bucket; `None` or blank means the source bucket.
    pub destination_bucket: Option<String>,
    /// Delete the source after copying (a move).
    pub delete_source: bool,
    /// Folder copies only: transfer only keys ending in this string.
    pub suffix: Option<String>,
}

impl TransferOptions {
    /// Options for a move within the same bucket.
    pub fn moving() -> Self {
        Self {
            delete_source: true,
            ..Self::default()
        }
    }

    pub fn to_bucket(bucket: impl Into<String>) -> Self {
        Self {
            destination_bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    fn destination_bucket<'a>(&'a self, source_bucket: &'a str) -> &'a str {
        self.destination_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .unwrap_or(source_bucket)
    }
}

impl<S: ObjectStore> Bucket<S> {
    /// Copy each key to `destination_prefix/<leaf name>`.
    ///
    /// With `delete_source`, each source key is deleted right after its own
    /// copy succeeds. Returns the destination keys in input order.
    pub async fn copy_keys(
        &self,
        keys: &[String],
        destination_prefix: &str,
        options: &TransferOptions,
    ) -> Result<Vec<String>, TransferError> {
        if keys.is_empty() {
            debug!(destination_prefix, "No keys to copy");
            return Ok(Vec::new());
        }
        let destination_bucket = options.destination_bucket(self.name());
        let mut completed: Vec<String> = Vec::with_capacity(keys.len());
        let mut destinations = Vec::with_capacity(keys.len());

        for key in keys {
            let destination_key = keyspace::join_key(destination_prefix, keyspace::leaf_name(key));
            if let Err(source) = self
                .store()
                .copy_object(self.name(), key, destination_bucket, &destination_key)
                .await
            {
                error!(
                    source_key = %key,
                    destination_bucket,
                    destination_key = %destination_key,
                    completed = completed.len(),
                    error = %source,
                    "Copy failed"
                );
                return Err(TransferError::Copy {
                    source_key: key.clone(),
                    destination_key,
                    completed,
                    source,
                });
            }
            debug!(source_key = %key, destination_key = %destination_key, "Copied key");

            if options.delete_source {
                if let Err(source) = self.store().delete_object(self.name(), key).await {
                    error!(
                        key = %key,
                        completed = completed.len(),
                        error = %source,
                        "Delete after copy failed, key now exists at source and destination"
                    );
                    return Err(TransferError::Delete {
                        key: key.clone(),
                        completed,
                        source,
                    });
                }
            }
            completed.push(key.clone());
            destinations.push(destination_key);
        }

        info!(
            count = destinations.len(),
            source_bucket = %self.name(),
            destination_bucket,
            destination_prefix,
            moved = options.delete_source,
            "Copied keys"
        );
        Ok(destinations)
    }

    /// Copy every key in the folder `source_prefix` (optionally suffix-filtered)
    /// into `destination_prefix`. Sibling folders sharing the name as a prefix,
    /// such as `raw/2024-old` for `raw/2024`, are not part of the folder.
    ///
    /// With `delete_source` the whole source subtree is bulk-deleted after all
    /// copies succeed, including keys the suffix filter skipped.
    pub async fn copy_folder(
        &self,
        source_prefix: &str,
        destination_prefix: &str,
        options: &TransferOptions,
    ) -> Result<Vec<String>, TransferError> {
        let source_folder = keyspace::folder_prefix(source_prefix);
        let list_options = ListOptions {
            limit: None,
            suffix: options.suffix.clone(),
        };
        let listing = self.list_keys(&source_folder, &list_options).await?;
        info!(
            source_prefix,
            destination_prefix,
            count = listing.keys.len(),
            "Copying folder"
        );

        let per_key = TransferOptions {
            delete_source: false,
            ..options.clone()
        };
        let copied = self
            .copy_keys(&listing.keys, destination_prefix, &per_key)
            .await?;

        if options.delete_source {
            self.delete_prefix(&source_folder).await?;
        }
        Ok(copied)
    }

    /// Copy every key under `source_prefix` keeping its path from the last
    /// occurrence of `partition_marker` onwards, e.g. `date_partition=.../file`.
    pub async fn copy_partitions(
        &self,
        source_prefix: &str,
        destination_prefix: &str,
        partition_marker: &str,
        delete_source: bool,
    ) -> Result<Vec<String>, TransferError> {
        let source_folder = keyspace::folder_prefix(source_prefix);
        let listing = self.list_keys(&source_folder, &ListOptions::default()).await?;
        let mut completed: Vec<String> = Vec::with_capacity(listing.keys.len());
        let mut destinations = Vec::with_capacity(listing.keys.len());

        for key in listing.keys {
            let destination_key = keyspace::join_key(
                destination_prefix,
                keyspace::partition_tail(&key, partition_marker),
            );
            if let Err(source) = self
                .store()
                .copy_object(self.name(), &key, self.name(), &destination_key)
                .await
            {
                error!(source_key = %key, destination_key = %destination_key, error = %source, "Partition copy failed");
                return Err(TransferError::Copy {
                    source_key: key,
                    destination_key,
                    completed,
                    source,
                });
            }
            completed.push(key);
            destinations.push(destination_key);
        }

        if delete_source {
            self.delete_prefix(&source_folder).await?;
        }
        info!(source_prefix, destination_prefix, count = destinations.len(), "Copied partitions");
        Ok(destinations)
    }

    /// Bulk-delete every key under `prefix`. An empty prefix covers the whole
    /// bucket.
    pub async fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        if prefix.is_empty() {
            warn!(bucket = %self.name(), "Deleting by empty prefix removes every key in the bucket");
        }
        let listing = self.list_keys(prefix, &ListOptions::default()).await?;
        self.delete_keys(&listing.keys).await?;
        info!(bucket = %self.name(), prefix, count = listing.keys.len(), "Deleted prefix");
        Ok(listing.keys.len())
    }

    /// Delete every key in the folder one by one. Does nothing if no key
    /// starts with `prefix`.
    pub async fn delete_folder(&self, prefix: &str) -> StoreResult<usize> {
        if !self.folder_exists(prefix).await? {
            return Ok(0);
        }
        let listing = self
            .list_keys(&keyspace::folder_prefix(prefix), &ListOptions::default())
            .await?;
        for key in &listing.keys {
            info!(key = %key, "Deleting key from folder");
            self.delete_key(key).await?;
        }
        Ok(listing.keys.len())
    }

    pub async fn delete_key(&self, key: &str) -> StoreResult<()> {
        info!(bucket = %self.name(), key, "Deleting object");
        self.store().delete_object(self.name(), key).await
    }

    /// Bulk delete, one request per [`PAGE_SIZE`] keys. An empty slice issues
    /// no request.
    pub async fn delete_keys(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        info!(bucket = %self.name(), count = keys.len(), "Deleting objects");
        for batch in keys.chunks(PAGE_SIZE) {
            self.store()
                .delete_objects(self.name(), batch.to_vec())
                .await?;
        }
        Ok(())
    }
}
