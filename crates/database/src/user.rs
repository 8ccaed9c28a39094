//! User reads and test fixtures.
//!
//! Users are created by the auth collaborator; the core reads them for
//! context assembly and tier checks. `create_user` exists for tests and
//! local seeding.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{ExperienceLevel, SubscriptionTier, User};

/// Get a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, display_name, experience_level, city, climate_zone, home_type,
               light_level, humidity_level, subscription_tier, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Get a user's subscription tier.
pub async fn get_tier(pool: &PgPool, id: Uuid) -> Result<SubscriptionTier> {
    let tier: Option<(SubscriptionTier,)> =
        sqlx::query_as("SELECT subscription_tier FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    tier.map(|(t,)| t).ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Insert a user row. The HTTP surface never calls this; tests and local
/// seeding do.
pub async fn create_user(pool: &PgPool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, display_name, experience_level, city, climate_zone,
                           home_type, light_level, humidity_level, subscription_tier)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(user.id)
    .bind(&user.display_name)
    .bind(user.experience_level)
    .bind(&user.city)
    .bind(&user.climate_zone)
    .bind(&user.home_type)
    .bind(&user.light_level)
    .bind(&user.humidity_level)
    .bind(user.subscription_tier)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: user.id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Delete a user. Cascades to plants, sessions, memories, reminders,
/// usage logs, and photos.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// A minimal user fixture for tests.
pub fn test_user(tier: SubscriptionTier) -> User {
    User {
        id: Uuid::new_v4(),
        display_name: "Test User".to_string(),
        experience_level: ExperienceLevel::Beginner,
        city: Some("Portland".to_string()),
        climate_zone: None,
        home_type: Some("apartment".to_string()),
        light_level: Some("medium".to_string()),
        humidity_level: None,
        subscription_tier: tier,
        created_at: chrono::Utc::now(),
    }
}
