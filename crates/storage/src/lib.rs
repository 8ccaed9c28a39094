//! Photo storage adapter.
//!
//! The bucket is private; clients only ever see short-lived signed URLs.
//! Keys follow `{userId}/{plantIdOrTempId}/{kind}-{timestampMs}.jpg`, so
//! timestamped uploads never collide and cancelled requests leave no
//! dangling shared state.

mod error;
mod key;
mod s3;
mod thumbnail;

pub use error::StorageError;
pub use key::{photo_key, PhotoOwner};
pub use s3::{S3Config, S3PhotoStorage};
pub use thumbnail::make_thumbnail;

use async_trait::async_trait;

/// Default signed URL lifetime: one hour.
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;

/// An uploaded photo pair with signed read URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    /// Signed URL for the original.
    pub url: String,
    /// Signed URL for the thumbnail, when one was uploaded.
    pub thumbnail_url: Option<String>,
    /// Object key of the original, for later attachment to a plant.
    pub key: String,
}

/// Narrow storage surface the pipelines consume.
///
/// Implementations must be safe for concurrent use; the pipelines call
/// them from many tasks at once.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Upload original bytes (and an optional thumbnail) under `key`,
    /// returning signed read URLs with the given expiry.
    async fn put_photo(
        &self,
        key: &str,
        original: Vec<u8>,
        thumbnail: Option<Vec<u8>>,
        expiry_secs: u64,
    ) -> Result<StoredPhoto, StorageError>;

    /// Produce a fresh signed read URL for an existing object.
    async fn presign_get(&self, key: &str, expiry_secs: u64) -> Result<String, StorageError>;
}
