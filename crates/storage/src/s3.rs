//! S3-backed photo storage.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::key::thumbnail_key;
use crate::{PhotoStorage, StoredPhoto};

/// Configuration for [`S3PhotoStorage`].
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name. The bucket must be private.
    pub bucket: String,
    /// Optional prefix prepended to every key.
    pub key_prefix: Option<String>,
}

impl S3Config {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `STORAGE_BUCKET` - bucket name
    ///
    /// Optional environment variables:
    /// - `STORAGE_KEY_PREFIX` - key prefix
    pub fn from_env() -> Result<Self, StorageError> {
        let bucket = std::env::var("STORAGE_BUCKET")
            .map_err(|_| StorageError::Upload("STORAGE_BUCKET not set".to_string()))?;
        Ok(Self {
            bucket,
            key_prefix: std::env::var("STORAGE_KEY_PREFIX").ok(),
        })
    }
}

/// Photo storage backed by an S3-compatible bucket.
pub struct S3PhotoStorage {
    client: S3Client,
    config: S3Config,
}

impl S3PhotoStorage {
    /// Wrap an existing S3 client.
    pub fn new(client: S3Client, config: S3Config) -> Self {
        Self { client, config }
    }

    /// Build a client from the ambient AWS environment.
    pub async fn from_env(config: S3Config) -> Self {
        let shared = aws_config::from_env().load().await;
        Self::new(S3Client::new(&shared), config)
    }

    fn full_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type("image/jpeg")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("put {} failed: {}", key, e)))?;
        Ok(())
    }

    async fn sign(&self, key: &str, expiry_secs: u64) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expiry_secs))
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(format!("presign {} failed: {}", key, e)))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl PhotoStorage for S3PhotoStorage {
    async fn put_photo(
        &self,
        key: &str,
        original: Vec<u8>,
        thumbnail: Option<Vec<u8>>,
        expiry_secs: u64,
    ) -> Result<StoredPhoto, StorageError> {
        let full_key = self.full_key(key);
        debug!(key = %full_key, bytes = original.len(), "uploading photo");

        self.put_object(&full_key, original).await?;
        let url = self.sign(&full_key, expiry_secs).await?;

        let thumbnail_url = match thumbnail {
            Some(bytes) => {
                let thumb_key = thumbnail_key(&full_key);
                match self.put_object(&thumb_key, bytes).await {
                    Ok(()) => Some(self.sign(&thumb_key, expiry_secs).await?),
                    Err(e) => {
                        // The original made it; a missing thumbnail is not
                        // worth failing the call over.
                        warn!(error = %e, "thumbnail upload failed");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(StoredPhoto {
            url,
            thumbnail_url,
            key: full_key,
        })
    }

    async fn presign_get(&self, key: &str, expiry_secs: u64) -> Result<String, StorageError> {
        self.sign(&self.full_key(key), expiry_secs).await
    }
}
