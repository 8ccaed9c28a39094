//! Base64 image normalization and size validation.
//!
//! Clients send images as base64 strings, optionally wrapped in a
//! `data:image/jpeg;base64,` prefix. Gateways always receive the bare
//! payload; the pipelines validate size before any provider call.

use thiserror::Error;

/// Maximum decoded size for a single image: 10 MiB.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Validation failures for client-supplied images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    /// The decoded image would exceed [`MAX_IMAGE_BYTES`].
    #[error("image {index} exceeds the {max_bytes} byte limit ({estimated} bytes)")]
    TooLarge {
        index: usize,
        estimated: usize,
        max_bytes: usize,
    },
    /// The image payload is empty after prefix stripping.
    #[error("image {index} is empty")]
    Empty { index: usize },
}

/// Strip a `data:*;base64,` prefix, leaving the raw base64 payload.
///
/// Idempotent: normalizing an already-normalized string returns it
/// unchanged. Surrounding whitespace is trimmed either way.
pub fn normalize_base64_image(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix("data:") {
        if let Some(idx) = rest.find("base64,") {
            return rest[idx + "base64,".len()..].to_string();
        }
    }
    trimmed.to_string()
}

/// Estimated decoded byte count for a base64 payload: `ceil(len * 0.75)`.
///
/// Deliberately an estimate - padding makes it off by at most two bytes,
/// which the 10 MiB cap tolerates.
pub fn estimated_decoded_size(base64_payload: &str) -> usize {
    (base64_payload.len() * 3).div_ceil(4)
}

/// Normalize and size-check a batch of images, returning the bare payloads.
///
/// The first violation rejects the whole batch and reports the offending
/// index.
pub fn normalize_and_validate(images: &[String]) -> Result<Vec<String>, ImageError> {
    let mut normalized = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let payload = normalize_base64_image(image);
        if payload.is_empty() {
            return Err(ImageError::Empty { index });
        }
        let estimated = estimated_decoded_size(&payload);
        if estimated > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                index,
                estimated,
                max_bytes: MAX_IMAGE_BYTES,
            });
        }
        normalized.push(payload);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_uri_prefix() {
        let input = "data:image/jpeg;base64,aGVsbG8=";
        assert_eq!(normalize_base64_image(input), "aGVsbG8=");
    }

    #[test]
    fn test_strip_png_prefix() {
        let input = "data:image/png;base64,iVBORw0KGgo=";
        assert_eq!(normalize_base64_image(input), "iVBORw0KGgo=");
    }

    #[test]
    fn test_bare_payload_unchanged() {
        assert_eq!(normalize_base64_image("aGVsbG8="), "aGVsbG8=");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_base64_image("data:image/jpeg;base64,aGVsbG8=");
        let twice = normalize_base64_image(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(normalize_base64_image("  aGVsbG8=\n"), "aGVsbG8=");
    }

    #[test]
    fn test_estimated_size() {
        // 4 base64 chars -> 3 bytes
        assert_eq!(estimated_decoded_size("aGVs"), 3);
        // ceil rounding
        assert_eq!(estimated_decoded_size("aGVsb"), 4);
        assert_eq!(estimated_decoded_size(""), 0);
    }

    #[test]
    fn test_validate_at_boundary() {
        // Exactly 10 MiB decoded: len * 3 / 4 == MAX
        let len = MAX_IMAGE_BYTES * 4 / 3;
        let at_limit = "A".repeat(len);
        let over_limit = "A".repeat(len + 4);

        assert!(normalize_and_validate(&[at_limit]).is_ok());
        let err = normalize_and_validate(&[over_limit]).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { index: 0, .. }));
    }

    #[test]
    fn test_validate_reports_offending_index() {
        let big = "A".repeat(MAX_IMAGE_BYTES * 4 / 3 + 8);
        let images = vec!["aGVsbG8=".to_string(), "aGVsbG8=".to_string(), big];
        let err = normalize_and_validate(&images).unwrap_err();
        assert!(matches!(err, ImageError::TooLarge { index: 2, .. }));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let images = vec!["data:image/jpeg;base64,".to_string()];
        let err = normalize_and_validate(&images).unwrap_err();
        assert_eq!(err, ImageError::Empty { index: 0 });
    }
}
