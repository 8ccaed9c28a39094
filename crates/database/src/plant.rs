//! Plant operations.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{Plant, PlantHealth};

const PLANT_COLUMNS: &str = "id, user_id, species_id, nickname, location_in_home, \
     light_exposure, watering_frequency_days, last_watered, next_water_due, \
     last_fertilized, current_health, acquired_at, created_at";

/// Fields to insert for a new plant.
#[derive(Debug, Clone)]
pub struct NewPlant {
    pub user_id: Uuid,
    pub species_id: Option<Uuid>,
    pub nickname: Option<String>,
    pub location_in_home: String,
    pub light_exposure: String,
    /// Derived at creation from the species' free-text water frequency.
    pub watering_frequency_days: i32,
}

/// Insert a new plant and return it.
pub async fn create_plant(pool: &PgPool, new: &NewPlant) -> Result<Plant> {
    let plant = sqlx::query_as::<_, Plant>(&format!(
        r#"
        INSERT INTO plants (user_id, species_id, nickname, location_in_home,
                            light_exposure, watering_frequency_days)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {PLANT_COLUMNS}
        "#
    ))
    .bind(new.user_id)
    .bind(new.species_id)
    .bind(&new.nickname)
    .bind(&new.location_in_home)
    .bind(&new.light_exposure)
    .bind(new.watering_frequency_days)
    .fetch_one(pool)
    .await?;

    Ok(plant)
}

/// Get a plant owned by a user. Ownership is part of the lookup, so a
/// foreign plant id behaves exactly like a missing one.
pub async fn get_plant(pool: &PgPool, user_id: Uuid, plant_id: Uuid) -> Result<Plant> {
    sqlx::query_as::<_, Plant>(&format!(
        "SELECT {PLANT_COLUMNS} FROM plants WHERE id = $1 AND user_id = $2"
    ))
    .bind(plant_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Plant",
        id: plant_id.to_string(),
    })
}

/// List a user's plants, most recently added first.
pub async fn list_plants(pool: &PgPool, user_id: Uuid) -> Result<Vec<Plant>> {
    let plants = sqlx::query_as::<_, Plant>(&format!(
        "SELECT {PLANT_COLUMNS} FROM plants WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(plants)
}

/// Record a watering. Maintains `next_water_due = last_watered +
/// watering_frequency_days`.
pub async fn record_watering(
    pool: &PgPool,
    user_id: Uuid,
    plant_id: Uuid,
    watered_at: DateTime<Utc>,
) -> Result<Plant> {
    let plant = get_plant(pool, user_id, plant_id).await?;
    let next_due = watered_at + Duration::days(plant.watering_frequency_days as i64);

    let updated = sqlx::query_as::<_, Plant>(&format!(
        r#"
        UPDATE plants
        SET last_watered = $3, next_water_due = $4
        WHERE id = $1 AND user_id = $2
        RETURNING {PLANT_COLUMNS}
        "#
    ))
    .bind(plant_id)
    .bind(user_id)
    .bind(watered_at)
    .bind(next_due)
    .fetch_one(pool)
    .await?;

    Ok(updated)
}

/// Update a plant's current health.
pub async fn set_health(
    pool: &PgPool,
    user_id: Uuid,
    plant_id: Uuid,
    health: PlantHealth,
) -> Result<()> {
    let result = sqlx::query("UPDATE plants SET current_health = $3 WHERE id = $1 AND user_id = $2")
        .bind(plant_id)
        .bind(user_id)
        .bind(health)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Plant",
            id: plant_id.to_string(),
        });
    }

    Ok(())
}

/// Delete a plant.
///
/// Sessions referencing the plant are detached, not deleted: the nullify
/// and the delete run in one transaction so a session never points at a
/// missing plant.
pub async fn delete_plant(pool: &PgPool, user_id: Uuid, plant_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE conversation_sessions SET plant_id = NULL WHERE plant_id = $1")
        .bind(plant_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM plants WHERE id = $1 AND user_id = $2")
        .bind(plant_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Plant",
            id: plant_id.to_string(),
        });
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::{session, user};

    async fn seeded_plant(pool: &PgPool) -> Plant {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(pool, &owner).await.unwrap();
        create_plant(
            pool,
            &NewPlant {
                user_id: owner.id,
                species_id: None,
                nickname: Some("Fernando".to_string()),
                location_in_home: "living room".to_string(),
                light_exposure: "bright indirect".to_string(),
                watering_frequency_days: 7,
            },
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_watering_maintains_next_due(pool: PgPool) {
        let plant = seeded_plant(&pool).await;
        let watered_at = Utc::now();

        let updated = record_watering(&pool, plant.user_id, plant.id, watered_at)
            .await
            .unwrap();

        assert_eq!(updated.last_watered, Some(watered_at));
        assert_eq!(
            updated.next_water_due,
            Some(watered_at + Duration::days(7))
        );
    }

    #[sqlx::test]
    async fn test_foreign_plant_is_not_found(pool: PgPool) {
        let plant = seeded_plant(&pool).await;
        let stranger = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &stranger).await.unwrap();

        let result = get_plant(&pool, stranger.id, plant.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[sqlx::test]
    async fn test_delete_detaches_sessions(pool: PgPool) {
        let plant = seeded_plant(&pool).await;
        let created = session::create_session(&pool, plant.user_id, Some(plant.id), None)
            .await
            .unwrap();

        delete_plant(&pool, plant.user_id, plant.id).await.unwrap();

        let detached = session::get_session(&pool, plant.user_id, created.id)
            .await
            .unwrap();
        assert_eq!(detached.plant_id, None);
    }
}
