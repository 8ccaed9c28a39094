//! Thumbnail generation.

use image::imageops::FilterType;
use image::codecs::jpeg::JpegEncoder;

use crate::error::StorageError;

/// Thumbnail edge length.
pub const THUMBNAIL_SIZE: u32 = 300;

/// JPEG quality for thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 80;

/// Produce a 300x300 cover-fit JPEG thumbnail from original image bytes.
///
/// Cover-fit: the image is scaled to fill the square and center-cropped,
/// never letterboxed.
pub fn make_thumbnail(original: &[u8]) -> Result<Vec<u8>, StorageError> {
    let decoded = image::load_from_memory(original)
        .map_err(|e| StorageError::Image(format!("decode failed: {}", e)))?;

    let resized = decoded.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, THUMBNAIL_QUALITY);
    resized
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| StorageError::Image(format!("encode failed: {}", e)))?;

    Ok(output)
}
