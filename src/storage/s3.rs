//! S3 storage backend.
//!
//! Ranged reads map to `GetObject` with a `Range` header, so each partition
//! scan fetches only its own slice of the reference. Custom endpoints
//! (MinIO, LocalStack, ...) are supported with path-style addressing.

use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use bytes::Bytes;

/// `DeleteObjects` accepts at most this many keys per request.
const DELETE_BATCH: usize = 1000;

/// S3 storage backend.
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    /// Create a new S3Storage instance.
    ///
    /// # Arguments
    ///
    /// * `region` - Optional AWS region (uses SDK defaults if not specified)
    /// * `endpoint` - Optional custom endpoint URL (for S3-compatible services)
    pub async fn new(region: Option<String>, endpoint: Option<String>) -> Self {
        let mut config_loader = aws_config::from_env();

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region));
        }

        let sdk_config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config.build()),
        }
    }

    async fn read(&self, bucket: &str, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(r) = range {
            request = request.range(r.http_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!("S3 get_object {}/{} failed: {}", bucket, key, e))
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(format!("S3 read body failed: {}", e)))?;

        Ok(body.into_bytes())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|_| Error::NotFound(format!("{}/{}", bucket, key)))?;

        Ok(head.content_length().unwrap_or(0) as u64)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: ByteRange) -> Result<Bytes> {
        // An empty Range header is invalid for S3
        if range.is_empty() {
            return Ok(Bytes::new());
        }
        self.read(bucket, key, Some(range)).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.read(bucket, key, None).await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!("S3 put_object {}/{} failed: {}", bucket, key, e))
            })?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| Error::Storage(format!("S3 list_objects_v2 failed: {}", e)))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        for batch in keys.chunks(DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| Error::Internal(format!("object identifier: {}", e)))
                })
                .collect::<Result<Vec<_>>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| Error::Internal(format!("delete request: {}", e)))?;

            self.client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Error::Storage(format!("S3 delete_objects failed: {}", e)))?;
        }
        Ok(())
    }
}
