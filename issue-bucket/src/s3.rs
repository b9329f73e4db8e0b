//! `ObjectStore` over the AWS SDK: the only place the CLI talks S3.
//!
//! Local endpoints (anything containing `local`, e.g. a localstack container)
//! get static dummy credentials and path-style addressing; every other endpoint
//! uses the default credential chain. Writes and copies grant the bucket owner
//! full control.

use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, EncodingType, Object, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use issue_bucket_core::config::ConnectorConfig;
use issue_bucket_core::contract::{
    ListRequest, ListedObject, ListingPage, ObjectRecord, ObjectStore,
};
use issue_bucket_core::error::StoreError;
use issue_bucket_core::keyspace;

const LOCAL_ACCESS_KEY: &str = "foo";
const LOCAL_SECRET_KEY: &str = "bar";

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub async fn new(config: &ConnectorConfig) -> Self {
        let region = Region::new(config.query_region.clone());
        let s3_config = if config.is_local_endpoint() {
            debug!(endpoint = %config.store_endpoint, "Using local endpoint with dummy credentials");
            let credentials =
                Credentials::new(LOCAL_ACCESS_KEY, LOCAL_SECRET_KEY, None, None, "issue-bucket");
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(region)
                .endpoint_url(&config.store_endpoint)
                .force_path_style(true)
                .build()
        } else {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
                .endpoint_url(&config.store_endpoint)
                .build()
        };
        info!(endpoint = %config.store_endpoint, "Initialized S3 client");
        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

fn service_failure<E: Error>(operation: &str, err: E) -> StoreError {
    let message = format!("{operation}: {}", DisplayErrorContext(err));
    warn!(operation, error = %message, "S3 request failed");
    StoreError::Service(message)
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

fn listed(object: Object) -> Option<ListedObject> {
    let last_modified = object.last_modified().and_then(to_chrono);
    let size = object.size().unwrap_or(0).max(0) as u64;
    object.key.map(|key| ListedObject {
        key,
        size,
        last_modified,
    })
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, StoreError> {
        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(SdkError::ServiceError(service_error))
                if matches!(service_error.err(), GetObjectError::NoSuchKey(_)) =>
            {
                return Err(not_found(bucket, key));
            }
            Err(err) => return Err(service_failure("get_object", err)),
        };

        let last_modified = response.last_modified().and_then(to_chrono);
        let metadata = response.metadata().cloned().unwrap_or_default();
        let body = response
            .body
            .collect()
            .await
            .map_err(|err| service_failure("get_object body", err))?
            .into_bytes();
        Ok(ObjectRecord {
            body,
            metadata,
            last_modified,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_metadata(metadata)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .send()
            .await
            .map_err(|err| service_failure("put_object", err))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| service_failure("delete_object", err))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<(), StoreError> {
        let objects = keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| service_failure("delete_objects request", err))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|err| service_failure("delete_objects request", err))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| service_failure("delete_objects", err))?;

        if let Some(failed) = response.errors().first() {
            return Err(StoreError::Service(format!(
                "delete_objects: {} keys not deleted, first {}: {}",
                response.errors().len(),
                failed.key().unwrap_or_default(),
                failed.message().unwrap_or_default()
            )));
        }
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest) -> Result<ListingPage, StoreError> {
        let encoding = request.url_encoded.then_some(EncodingType::Url);
        let response = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter)
            .set_continuation_token(request.continuation_token)
            .set_max_keys(request.max_keys)
            .set_encoding_type(encoding)
            .send()
            .await
            .map_err(|err| service_failure("list_objects_v2", err))?;

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|prefix| prefix.prefix().map(str::to_string))
            .collect();
        let next_token = response.next_continuation_token().map(str::to_string);
        let contents = response
            .contents
            .map(|objects| objects.into_iter().filter_map(listed).collect());

        Ok(ListingPage {
            contents,
            common_prefixes,
            next_token,
        })
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_bucket: &str,
        destination_key: &str,
    ) -> Result<(), StoreError> {
        self.client
            .copy_object()
            .copy_source(keyspace::encode_copy_source(source_bucket, source_key))
            .bucket(destination_bucket)
            .key(destination_key)
            .acl(ObjectCannedAcl::BucketOwnerFullControl)
            .send()
            .await
            .map_err(|err| service_failure("copy_object", err))?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<DateTime<Utc>, StoreError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(response) => Ok(response
                .last_modified()
                .and_then(to_chrono)
                .unwrap_or(DateTime::UNIX_EPOCH)),
            Err(SdkError::ServiceError(service_error))
                if matches!(service_error.err(), HeadObjectError::NotFound(_)) =>
            {
                Err(not_found(bucket, key))
            }
            Err(err) => Err(service_failure("head_object", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_sdk_timestamps() {
        let sdk = aws_sdk_s3::primitives::DateTime::from_secs(1_704_110_400);
        let converted = to_chrono(&sdk).unwrap();
        assert_eq!(converted.to_rfc3339(), "2024-01-01T12:00:00+00:00");
    }

    #[test]
    fn listed_object_without_key_is_skipped() {
        let object = Object::builder().size(12).build();
        assert!(listed(object).is_none());

        let object = Object::builder().key("raw/a.csv").size(12).build();
        let listed = listed(object).unwrap();
        assert_eq!(listed.key, "raw/a.csv");
        assert_eq!(listed.size, 12);
        assert!(listed.last_modified.is_none());
    }

    #[tokio::test]
    async fn local_endpoints_build_without_credentials_lookup() {
        let mut config = ConnectorConfig::new("data-lake");
        config.store_endpoint = "http://localhost:4566".to_string();
        let store = S3Store::new(&config).await;
        assert_eq!(
            store.client.config().region().map(|r| r.as_ref()),
            Some("eu-west-1")
        );
    }
}
