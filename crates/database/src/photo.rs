//! Plant photo references.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{PhotoKind, PlantPhoto};

const PHOTO_COLUMNS: &str = "id, user_id, plant_id, url, thumbnail_url, kind, created_at";

/// Store a photo reference.
pub async fn insert_photo(
    pool: &PgPool,
    user_id: Uuid,
    plant_id: Option<Uuid>,
    url: &str,
    thumbnail_url: Option<&str>,
    kind: PhotoKind,
) -> Result<PlantPhoto> {
    let photo = sqlx::query_as::<_, PlantPhoto>(&format!(
        r#"
        INSERT INTO plant_photos (user_id, plant_id, url, thumbnail_url, kind)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PHOTO_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(plant_id)
    .bind(url)
    .bind(thumbnail_url)
    .bind(kind)
    .fetch_one(pool)
    .await?;

    Ok(photo)
}

/// A user's photos, newest first.
pub async fn list_photos(pool: &PgPool, user_id: Uuid) -> Result<Vec<PlantPhoto>> {
    let photos = sqlx::query_as::<_, PlantPhoto>(&format!(
        "SELECT {PHOTO_COLUMNS} FROM plant_photos WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::user;

    #[sqlx::test]
    async fn test_photo_roundtrip(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();

        let photo = insert_photo(
            &pool,
            owner.id,
            None,
            "https://bucket/signed/full.jpg",
            Some("https://bucket/signed/thumb.jpg"),
            PhotoKind::Identification,
        )
        .await
        .unwrap();

        assert_eq!(photo.kind, PhotoKind::Identification);
        assert!(photo.plant_id.is_none());

        let photos = list_photos(&pool, owner.id).await.unwrap();
        assert_eq!(photos.len(), 1);
    }
}
