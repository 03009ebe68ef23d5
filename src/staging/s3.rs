//! Amazon S3 staging store.
//!
//! Keys are object keys in a single bucket:
//! ```text
//! s3://{bucket}/{pending_prefix}/{file}
//! s3://{bucket}/{processed_prefix}/{file}
//! ```
//!
//! `PutObject` is atomic, so a listed key always has its full body.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, warn};

use super::{Result, StagingError, StagingStore};

/// Bytes left unescaped in a `CopySource` key; `/` separates path segments.
const COPY_SOURCE_KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3-based staging store.
pub struct S3StagingStore {
    client: Client,
    bucket: String,
}

impl S3StagingStore {
    /// Create a new S3 staging store.
    ///
    /// Uses default credentials from the environment (AWS_ACCESS_KEY_ID,
    /// AWS_SECRET_ACCESS_KEY, or the Lambda execution role).
    pub async fn new(bucket: impl Into<String>, region: Option<&str>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = config_loader.load().await;

        Self {
            client: Client::new(&config),
            bucket: bucket.into(),
        }
    }

    /// Create with custom endpoint (for S3-compatible services like MinIO).
    pub async fn with_endpoint(
        bucket: impl Into<String>,
        endpoint: &str,
        region: Option<&str>,
    ) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .endpoint_url(endpoint)
            .force_path_style(true) // Required for MinIO and most S3-compatible services
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.into(),
        }
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// `CopySource` value: `{bucket}/{key}` with the key URL-encoded.
    fn copy_source(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(key, COPY_SOURCE_KEY_ENCODE)
        )
    }

    /// Page through objects directly under `prefix`, calling `visit` for each.
    async fn for_each_object<F>(&self, prefix: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(&aws_sdk_s3::types::Object),
    {
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/");

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| StagingError::ListFailed {
                prefix: prefix.to_string(),
                reason: format!("S3 list failed: {}", e),
            })?;

            for object in response.contents() {
                visit(object);
            }

            continuation_token = response.next_continuation_token().map(|s| s.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl StagingStore for S3StagingStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StagingError::PutFailed {
                key: key.to_string(),
                reason: format!("S3 upload failed: {}", e),
            })?;

        debug!(key = %key, size, bucket = %self.bucket, "Stored staged object in S3");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("NoSuchKey") || err_str.contains("404") {
                    StagingError::NotFound(key.to_string())
                } else {
                    StagingError::GetFailed {
                        key: key.to_string(),
                        reason: format!("S3 download failed: {}", e),
                    }
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StagingError::GetFailed {
                key: key.to_string(),
                reason: format!("S3 body read failed: {}", e),
            })?
            .into_bytes()
            .to_vec();

        Ok(body)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StagingError::GetFailed {
                key: key.to_string(),
                reason: format!("S3 head failed: {}", e),
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        self.for_each_object(prefix, |object| {
            if let Some(key) = object.key() {
                // Console-created "folder" placeholders share the prefix key
                if key != prefix {
                    keys.push(key.to_string());
                }
            }
        })
        .await?;
        keys.sort();
        Ok(keys)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(to)
            .copy_source(self.copy_source(from))
            .send()
            .await
            .map_err(|e| StagingError::CopyFailed {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("S3 copy failed: {}", e),
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StagingError::DeleteFailed {
                key: key.to_string(),
                reason: format!("S3 delete failed: {}", e),
            })?;
        Ok(())
    }

    async fn delete_older_than(&self, prefix: &str, age: Duration) -> Result<usize> {
        let cutoff = SystemTime::now() - age;
        let cutoff_secs = cutoff
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let mut expired = Vec::new();
        self.for_each_object(prefix, |object| {
            if let (Some(key), Some(last_modified)) = (object.key(), object.last_modified()) {
                if key != prefix && last_modified.secs() < cutoff_secs {
                    expired.push(key.to_string());
                }
            }
        })
        .await?;

        let mut deleted = 0;
        for key in expired {
            if let Err(e) = self.delete(&key).await {
                warn!(key = %key, error = %e, "Failed to delete expired staged object from S3");
            } else {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    fn storage_type(&self) -> &'static str {
        "s3"
    }
}
