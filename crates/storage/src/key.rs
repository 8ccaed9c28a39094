//! Object key layout.

use std::fmt;

/// The middle segment of a photo key: a real plant id or a temp id for
/// photos taken before a plant exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOwner {
    Plant(String),
    /// Identification uploads that may never be attached to a plant.
    /// A storage lifecycle rule can reap `temp-*` prefixes out of band.
    Temp(i64),
}

impl fmt::Display for PhotoOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoOwner::Plant(id) => f.write_str(id),
            PhotoOwner::Temp(timestamp_ms) => write!(f, "temp-{}", timestamp_ms),
        }
    }
}

/// Build the object key `{userId}/{plantIdOrTempId}/{kind}-{timestampMs}.jpg`.
pub fn photo_key(user_id: &str, owner: &PhotoOwner, kind: &str, timestamp_ms: i64) -> String {
    format!("{}/{}/{}-{}.jpg", user_id, owner, kind, timestamp_ms)
}

/// Thumbnail key derived from an original key.
pub(crate) fn thumbnail_key(key: &str) -> String {
    match key.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-thumb.{}", stem, ext),
        None => format!("{}-thumb", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_key_layout() {
        let key = photo_key(
            "5f8a1c2e",
            &PhotoOwner::Temp(1735000000123),
            "identification",
            1735000000123,
        );
        assert_eq!(
            key,
            "5f8a1c2e/temp-1735000000123/identification-1735000000123.jpg"
        );
    }

    #[test]
    fn test_plant_key_layout() {
        let key = photo_key(
            "5f8a1c2e",
            &PhotoOwner::Plant("plant-9".to_string()),
            "progress",
            42,
        );
        assert_eq!(key, "5f8a1c2e/plant-9/progress-42.jpg");
    }

    #[test]
    fn test_thumbnail_key() {
        assert_eq!(thumbnail_key("u/p/health-42.jpg"), "u/p/health-42-thumb.jpg");
        assert_eq!(thumbnail_key("no-extension"), "no-extension-thumb");
    }

    #[test]
    fn test_timestamped_keys_do_not_collide() {
        let a = photo_key("u", &PhotoOwner::Temp(1), "identification", 1);
        let b = photo_key("u", &PhotoOwner::Temp(2), "identification", 2);
        assert_ne!(a, b);
    }
}
