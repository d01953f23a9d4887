use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::AppError;

// 1. StorageService Contract
/// StorageService
///
/// Defines the abstract contract for all interactions with the object storage
/// layer: write bytes at a path, resolve the fetchable URL for a path, delete
/// by path. The trait lets us swap the real S3 client (S3StorageClient) for
/// the in-memory mock (MockStorageService) in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup to
    /// provision the bucket in MinIO. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` at `key` and returns the publicly fetchable URL of the
    /// stored object.
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError>;

    /// Deletes the object at `key`. Idempotent at the S3 level; deleting a
    /// missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), AppError>;

    /// Resolves the public URL for an object key without touching the store.
    fn object_url(&self, key: &str) -> String;

    /// Inverse of `object_url`: recovers the object key from a URL previously
    /// produced by this service. Returns None for foreign URLs.
    fn object_key(&self, url: &str) -> Option<String>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`, empty segments) from a
/// user-influenced key so a crafted filename cannot traverse out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// The concrete implementation using the AWS SDK for S3. S3 compatibility
/// covers both the Dockerized MinIO instance used locally and the hosted
/// storage endpoint used in production. `force_path_style(true)` is required
/// by both gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client from the connection parameters resolved by
    /// AppConfig (after the runtime configuration fetch).
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required
            // for MinIO and hosted storage API gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Calls the S3 CreateBucket API. Idempotent, so it is safe at startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let key = sanitize_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        Ok(self.object_url(&key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        // Path-style public URL: endpoint/bucket/key.
        format!("{}/{}/{}", self.endpoint, self.bucket_name, key)
    }

    fn object_key(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", self.endpoint, self.bucket_name);
        url.strip_prefix(&prefix).map(|k| k.to_string())
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// An in-memory implementation of `StorageService` used exclusively for unit
/// and integration testing. Objects live in a HashMap so tests can assert on
/// what was stored and deleted without a network connection.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Returns the stored bytes for `key`, if any.
    pub fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys that have been passed to `delete_object`, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, AppError> {
        if self.should_fail {
            return Err(AppError::Upload("mock storage failure requested".into()));
        }
        let key = sanitize_key(key);
        self.objects.lock().unwrap().insert(key.clone(), bytes);
        Ok(self.object_url(&key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Upload("mock storage failure requested".into()));
        }
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", key)
    }

    fn object_key(&self, url: &str) -> Option<String> {
        url.strip_prefix("http://localhost:9000/mock-bucket/")
            .map(|k| k.to_string())
    }
}
