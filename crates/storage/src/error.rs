//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// URL signing failed.
    #[error("presign failed: {0}")]
    Presign(String),

    /// Image bytes could not be decoded or re-encoded.
    #[error("image processing failed: {0}")]
    Image(String),
}
