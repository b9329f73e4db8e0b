#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use issue_bucket_core::contract::{ListRequest, ListedObject, ListingPage, ObjectRecord, ObjectStore};
use issue_bucket_core::error::StoreError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

// What S3 leaves literal in a `EncodingType=url` listing.
const LISTING: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode a key the way S3 does for `EncodingType=url`: form encoding, so a
/// space becomes `+` and a literal `+` becomes `%2B`.
pub fn s3_url_encode(key: &str) -> String {
    utf8_percent_encode(key, LISTING).to_string().replace("%20", "+")
}

/// In-memory object store with S3-like listing: lexicographic order, fixed
/// page size, continuation token = last key of the previous page.
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), ObjectRecord>>,
    page_size: usize,
    pub list_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            list_calls: Mutex::new(0),
        }
    }

    pub fn with_objects(page_size: usize, bucket: &str, objects: &[(&str, usize)]) -> Self {
        let store = Self::new(page_size);
        for (key, size) in objects {
            store.insert(bucket, key, vec![b'x'; *size]);
        }
        store
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            ObjectRecord {
                body: body.into(),
                metadata: HashMap::new(),
                last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            },
        );
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), StoreError> {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            ObjectRecord {
                body,
                metadata: metadata.unwrap_or_default(),
                last_modified: Some(Utc::now()),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(&(bucket.to_string(), key));
        }
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest) -> Result<ListingPage, StoreError> {
        *self.list_calls.lock().unwrap() += 1;
        let objects = self.objects.lock().unwrap();
        let limit = request
            .max_keys
            .map(|m| m as usize)
            .unwrap_or(self.page_size)
            .min(self.page_size);

        let matching = objects
            .iter()
            .filter(|((bucket, key), _)| bucket == &request.bucket && key.starts_with(&request.prefix))
            .filter(|((_, key), _)| {
                request
                    .continuation_token
                    .as_ref()
                    .map_or(true, |token| key.as_str() > token.as_str())
            });

        let mut contents = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        let mut last_key = None;
        let mut truncated = false;
        for ((_, key), record) in matching {
            if contents.len() + common_prefixes.len() == limit {
                truncated = true;
                break;
            }
            last_key = Some(key.clone());
            if let Some(delimiter) = &request.delimiter {
                let rest = &key[request.prefix.len()..];
                if let Some(idx) = rest.find(delimiter.as_str()) {
                    common_prefixes.insert(format!("{}{}", request.prefix, &rest[..=idx]));
                    continue;
                }
            }
            let listed_key = if request.url_encoded {
                s3_url_encode(key)
            } else {
                key.clone()
            };
            contents.push(ListedObject {
                key: listed_key,
                size: record.body.len() as u64,
                last_modified: record.last_modified,
            });
        }

        Ok(ListingPage {
            contents: if contents.is_empty() { None } else { Some(contents) },
            common_prefixes: common_prefixes.into_iter().collect(),
            next_token: if truncated { last_key } else { None },
        })
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<(), StoreError> {
        let record = self.get_object(source_bucket, source_key).await?;
        self.objects.lock().unwrap().insert(
            (destination_bucket.to_string(), destination_key.to_string()),
            record,
        );
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<DateTime<Utc>, StoreError> {
        let record = self.get_object(bucket, key).await?;
        Ok(record.last_modified.unwrap_or(DateTime::UNIX_EPOCH))
    }
}
