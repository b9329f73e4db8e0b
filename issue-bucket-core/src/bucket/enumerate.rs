//! Enumeration engine: paginated listings and folder statistics.
//!
//! Pages are fetched strictly one after another; the continuation token of a
//! page is only requested once the previous page has been consumed. Listings
//! follow the store's native key order and are as consistent as the store's
//! own listing consistency model: keys written between two page requests may
//! or may not show up.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Bucket;
use crate::contract::{ListRequest, ListedObject, ObjectStore};
use crate::error::StoreResult;
use crate::keyspace;

/// Keys per listing page on S3-compatible stores. Limits above this switch
/// `list_keys` from a single request to a full paginated walk.
pub const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// `None` or `0` means no limit.
    pub limit: Option<usize>,
    /// Keep only keys ending in this exact string.
    pub suffix: Option<String>,
}

impl ListOptions {
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Self::default()
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn bounded_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0 && *limit <= PAGE_SIZE)
    }

    fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref().filter(|suffix| !suffix.is_empty())
    }
}

/// Keys under a prefix plus their combined size in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyListing {
    pub keys: Vec<String>,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedKey {
    pub key: String,
    /// Last modification time with the timezone dropped.
    pub last_modified: Option<NaiveDateTime>,
}

/// Aggregate of the matching files directly inside one virtual folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderStats {
    pub has_multiple_files: bool,
    pub file_count: u64,
    pub total_size: u64,
    pub file_names: Vec<String>,
}

impl FolderStats {
    fn record(&mut self, file_name: &str, size: u64) {
        self.has_multiple_files = self.file_count > 0;
        self.file_count += 1;
        self.total_size += size;
        self.file_names.push(file_name.to_string());
    }
}

/// Folders of an aggregation that hold more than one matching file.
pub fn folders_with_multiple_files(stats: &BTreeMap<String, FolderStats>) -> Vec<&str> {
    stats
        .iter()
        .filter(|(_, folder)| folder.has_multiple_files)
        .map(|(name, _)| name.as_str())
        .collect()
}

impl<S: ObjectStore> Bucket<S> {
    /// List the keys under `prefix`.
    ///
    /// Without a limit, or with one above [`PAGE_SIZE`], every page is walked
    /// with URL-encoded keys that are decoded on the way out. A smaller limit
    /// issues one bounded request.
    pub async fn list_keys(&self, prefix: &str, options: &ListOptions) -> StoreResult<KeyListing> {
        let suffix = options.suffix();
        let mut listing = KeyListing::default();
        let mut accept = |key: String, size: u64| {
            if suffix.map_or(true, |suffix| key.ends_with(suffix)) {
                listing.keys.push(key);
                listing.total_size += size;
            }
        };

        match options.bounded_limit() {
            Some(limit) => {
                let request = ListRequest {
                    max_keys: Some(limit as i32),
                    ..ListRequest::new(self.name(), prefix)
                };
                let page = self.store().list_objects(request).await?;
                for object in page.contents.unwrap_or_default() {
                    accept(keyspace::normalize_key(&object.key), object.size);
                }
            }
            None => {
                let request = ListRequest {
                    url_encoded: true,
                    ..ListRequest::new(self.name(), prefix)
                };
                self.walk_pages(request, |contents| {
                    for object in contents {
                        accept(keyspace::decode_listed_key(&object.key), object.size);
                    }
                })
                .await?;
            }
        }

        debug!(
            bucket = %self.name(),
            prefix,
            count = listing.keys.len(),
            total_size = listing.total_size,
            "Listed keys"
        );
        Ok(listing)
    }

    /// Every key under `prefix` with its last-modified time.
    pub async fn list_keys_with_timestamp(&self, prefix: &str) -> StoreResult<Vec<TimestampedKey>> {
        let request = ListRequest {
            url_encoded: true,
            ..ListRequest::new(self.name(), prefix)
        };
        let mut keys = Vec::new();
        self.walk_pages(request, |contents| {
            for object in contents {
                let key = keyspace::decode_listed_key(&object.key);
                debug!(key = %key, "Listed key with timestamp");
                keys.push(TimestampedKey {
                    key,
                    last_modified: object.last_modified.map(|t| t.naive_utc()),
                });
            }
        })
        .await?;
        Ok(keys)
    }

    /// Immediate child folders of `prefix`, as returned by one delimiter listing.
    pub async fn list_subfolders(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let request = ListRequest {
            delimiter: Some(keyspace::DELIMITER.to_string()),
            ..ListRequest::new(self.name(), prefix)
        };
        let page = self.store().list_objects(request).await?;
        debug!(prefix, count = page.common_prefixes.len(), "Listed subfolders");
        Ok(page.common_prefixes)
    }

    /// Per-folder count, size and file names of every key under `root_prefix`
    /// ending in `file_extension`. Folder markers are not files and never count.
    pub async fn aggregate_folder_stats(
        &self,
        root_prefix: &str,
        file_extension: &str,
    ) -> StoreResult<BTreeMap<String, FolderStats>> {
        let mut folders: BTreeMap<String, FolderStats> = BTreeMap::new();
        let mut matched: u64 = 0;

        self.walk_pages(ListRequest::new(self.name(), root_prefix), |contents| {
            for object in contents {
                if !object.key.ends_with(file_extension) || keyspace::is_folder_marker(&object.key) {
                    continue;
                }
                matched += 1;
                let (folder, file_name) = keyspace::split_key(&object.key);
                folders
                    .entry(folder.to_string())
                    .or_default()
                    .record(file_name, object.size);
            }
        })
        .await?;

        info!(
            root_prefix,
            file_extension,
            total_files = matched,
            folders = folders.len(),
            "Aggregated folder statistics"
        );
        Ok(folders)
    }

    /// Follow continuation tokens from `template` until the store stops
    /// returning one, handing each page's contents to `visit`.
    ///
    /// A page without contents counts as empty. A token that does not advance
    /// ends the walk instead of looping forever.
    pub(crate) async fn walk_pages<F>(&self, template: ListRequest, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(Vec<ListedObject>),
    {
        let mut token: Option<String> = None;
        let mut pages: usize = 0;
        loop {
            let request = ListRequest {
                continuation_token: token.clone(),
                ..template.clone()
            };
            let page = self.store().list_objects(request).await?;
            pages += 1;

            match page.contents {
                Some(contents) => visit(contents),
                None => warn!(
                    prefix = %template.prefix,
                    page = pages,
                    "Listing page has no contents, treating as empty"
                ),
            }

            match page.next_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    warn!(
                        prefix = %template.prefix,
                        page = pages,
                        "Continuation token did not advance, stopping enumeration"
                    );
                    break;
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!(prefix = %template.prefix, pages, "Enumeration complete");
        Ok(())
    }
}
