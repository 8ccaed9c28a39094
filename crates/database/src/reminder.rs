//! Reminder operations.
//!
//! A reminder is pending until completed or skipped. Recurring reminders
//! spawn the next pending instance at `due + interval * frequency` when
//! they leave the pending state.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::Reminder;

const REMINDER_COLUMNS: &str = "id, user_id, plant_id, kind, due_date, frequency, \
     interval_unit, completed, skipped, created_at";

/// Fields to insert for a new reminder.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: Uuid,
    pub plant_id: Uuid,
    pub kind: String,
    pub due_date: DateTime<Utc>,
    pub frequency: Option<i32>,
    pub interval_unit: Option<String>,
}

/// Insert a reminder and return it.
pub async fn create_reminder(pool: &PgPool, new: &NewReminder) -> Result<Reminder> {
    let reminder = sqlx::query_as::<_, Reminder>(&format!(
        r#"
        INSERT INTO reminders (user_id, plant_id, kind, due_date, frequency, interval_unit)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {REMINDER_COLUMNS}
        "#
    ))
    .bind(new.user_id)
    .bind(new.plant_id)
    .bind(&new.kind)
    .bind(new.due_date)
    .bind(new.frequency)
    .bind(&new.interval_unit)
    .fetch_one(pool)
    .await?;

    Ok(reminder)
}

/// Pending reminders for a user, soonest first.
pub async fn pending_reminders(pool: &PgPool, user_id: Uuid) -> Result<Vec<Reminder>> {
    let reminders = sqlx::query_as::<_, Reminder>(&format!(
        r#"
        SELECT {REMINDER_COLUMNS}
        FROM reminders
        WHERE user_id = $1 AND completed = false AND skipped = false
        ORDER BY due_date
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(reminders)
}

/// Mark a reminder completed. Returns the spawned follow-up for recurring
/// reminders.
pub async fn complete_reminder(
    pool: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
) -> Result<Option<Reminder>> {
    close_reminder(pool, user_id, reminder_id, true).await
}

/// Mark a reminder skipped. Returns the spawned follow-up for recurring
/// reminders.
pub async fn skip_reminder(
    pool: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
) -> Result<Option<Reminder>> {
    close_reminder(pool, user_id, reminder_id, false).await
}

async fn close_reminder(
    pool: &PgPool,
    user_id: Uuid,
    reminder_id: Uuid,
    completed: bool,
) -> Result<Option<Reminder>> {
    let mut tx = pool.begin().await?;

    let reminder = sqlx::query_as::<_, Reminder>(&format!(
        r#"
        UPDATE reminders
        SET completed = $3, skipped = $4
        WHERE id = $1 AND user_id = $2 AND completed = false AND skipped = false
        RETURNING {REMINDER_COLUMNS}
        "#
    ))
    .bind(reminder_id)
    .bind(user_id)
    .bind(completed)
    .bind(!completed)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Reminder",
        id: reminder_id.to_string(),
    })?;

    let follow_up = match next_due(&reminder) {
        Some(due) => {
            let spawned = sqlx::query_as::<_, Reminder>(&format!(
                r#"
                INSERT INTO reminders (user_id, plant_id, kind, due_date, frequency, interval_unit)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {REMINDER_COLUMNS}
                "#
            ))
            .bind(reminder.user_id)
            .bind(reminder.plant_id)
            .bind(&reminder.kind)
            .bind(due)
            .bind(reminder.frequency)
            .bind(&reminder.interval_unit)
            .fetch_one(&mut *tx)
            .await?;
            Some(spawned)
        }
        None => None,
    };

    tx.commit().await?;
    Ok(follow_up)
}

/// The next due date for a recurring reminder, `None` for one-shots.
fn next_due(reminder: &Reminder) -> Option<DateTime<Utc>> {
    let frequency = reminder.frequency?;
    let unit = reminder.interval_unit.as_deref()?;
    if frequency <= 0 {
        return None;
    }

    let step = match unit {
        "day" => Duration::days(frequency as i64),
        "week" => Duration::weeks(frequency as i64),
        "month" => Duration::days(30 * frequency as i64),
        _ => return None,
    };

    Some(reminder.due_date + step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::plant::{create_plant, NewPlant};
    use crate::user;

    async fn seeded_reminder(pool: &PgPool, frequency: Option<i32>) -> Reminder {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(pool, &owner).await.unwrap();
        let plant = create_plant(
            pool,
            &NewPlant {
                user_id: owner.id,
                species_id: None,
                nickname: None,
                location_in_home: "office".to_string(),
                light_exposure: "bright".to_string(),
                watering_frequency_days: 7,
            },
        )
        .await
        .unwrap();

        create_reminder(
            pool,
            &NewReminder {
                user_id: owner.id,
                plant_id: plant.id,
                kind: "water".to_string(),
                due_date: Utc::now(),
                frequency,
                interval_unit: frequency.map(|_| "week".to_string()),
            },
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_one_shot_completion_spawns_nothing(pool: PgPool) {
        let reminder = seeded_reminder(&pool, None).await;

        let follow_up = complete_reminder(&pool, reminder.user_id, reminder.id)
            .await
            .unwrap();
        assert!(follow_up.is_none());
        assert!(pending_reminders(&pool, reminder.user_id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_recurring_completion_spawns_follow_up(pool: PgPool) {
        let reminder = seeded_reminder(&pool, Some(2)).await;

        let follow_up = complete_reminder(&pool, reminder.user_id, reminder.id)
            .await
            .unwrap()
            .expect("recurring reminder should spawn a follow-up");
        assert_eq!(follow_up.due_date, reminder.due_date + Duration::weeks(2));
        assert!(!follow_up.completed);

        let pending = pending_reminders(&pool, reminder.user_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, follow_up.id);
    }

    #[sqlx::test]
    async fn test_skip_also_recurs(pool: PgPool) {
        let reminder = seeded_reminder(&pool, Some(1)).await;
        let follow_up = skip_reminder(&pool, reminder.user_id, reminder.id)
            .await
            .unwrap();
        assert!(follow_up.is_some());
    }

    #[sqlx::test]
    async fn test_double_completion_rejected(pool: PgPool) {
        let reminder = seeded_reminder(&pool, None).await;
        complete_reminder(&pool, reminder.user_id, reminder.id).await.unwrap();

        let result = complete_reminder(&pool, reminder.user_id, reminder.id).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }
}
