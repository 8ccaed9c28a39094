//! Health issue and treatment step operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{HealthIssue, IssueStatus, TreatmentStep};

const ISSUE_COLUMNS: &str =
    "id, plant_id, name, description, confidence, severity, status, reported_at, resolved_at";

/// A diagnosed issue with its ordered steps, ready to persist.
#[derive(Debug, Clone)]
pub struct NewHealthIssue {
    pub plant_id: Uuid,
    pub name: String,
    pub description: String,
    pub confidence: f64,
    pub severity: String,
    /// Treatment instructions in application order.
    pub treatments: Vec<String>,
}

/// Insert an issue and its treatment steps in one transaction.
pub async fn create_issue(pool: &PgPool, new: &NewHealthIssue) -> Result<HealthIssue> {
    let mut tx = pool.begin().await?;

    let issue = sqlx::query_as::<_, HealthIssue>(&format!(
        r#"
        INSERT INTO health_issues (plant_id, name, description, confidence, severity)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ISSUE_COLUMNS}
        "#
    ))
    .bind(new.plant_id)
    .bind(&new.name)
    .bind(&new.description)
    .bind(new.confidence)
    .bind(&new.severity)
    .fetch_one(&mut *tx)
    .await?;

    for (order, instruction) in new.treatments.iter().enumerate() {
        sqlx::query(
            "INSERT INTO treatment_steps (issue_id, step_order, instruction) VALUES ($1, $2, $3)",
        )
        .bind(issue.id)
        .bind(order as i32)
        .bind(instruction)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(issue)
}

/// The latest active or in-treatment issues for a plant, newest first.
pub async fn active_issues(pool: &PgPool, plant_id: Uuid, limit: i64) -> Result<Vec<HealthIssue>> {
    let issues = sqlx::query_as::<_, HealthIssue>(&format!(
        r#"
        SELECT {ISSUE_COLUMNS}
        FROM health_issues
        WHERE plant_id = $1 AND status IN ('active', 'treating')
        ORDER BY reported_at DESC
        LIMIT $2
        "#
    ))
    .bind(plant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(issues)
}

/// Ordered treatment steps for an issue.
pub async fn treatment_steps(pool: &PgPool, issue_id: Uuid) -> Result<Vec<TreatmentStep>> {
    let steps = sqlx::query_as::<_, TreatmentStep>(
        r#"
        SELECT id, issue_id, step_order, instruction, completed
        FROM treatment_steps
        WHERE issue_id = $1
        ORDER BY step_order
        "#,
    )
    .bind(issue_id)
    .fetch_all(pool)
    .await?;

    Ok(steps)
}

/// Advance an issue through its lifecycle.
///
/// Allowed transitions: active -> treating -> (resolved | recurring), and
/// recurring -> active on re-report. `resolved` is terminal.
pub async fn set_status(pool: &PgPool, issue_id: Uuid, next: IssueStatus) -> Result<()> {
    let current: Option<(IssueStatus,)> =
        sqlx::query_as("SELECT status FROM health_issues WHERE id = $1")
            .bind(issue_id)
            .fetch_optional(pool)
            .await?;

    let Some((current,)) = current else {
        return Err(DatabaseError::NotFound {
            entity: "HealthIssue",
            id: issue_id.to_string(),
        });
    };

    let allowed = matches!(
        (current, next),
        (IssueStatus::Active, IssueStatus::Treating)
            | (IssueStatus::Treating, IssueStatus::Resolved)
            | (IssueStatus::Treating, IssueStatus::Recurring)
            | (IssueStatus::Recurring, IssueStatus::Active)
    );
    if !allowed {
        return Err(DatabaseError::InvalidTransition {
            entity: "HealthIssue",
            detail: format!("{:?} -> {:?}", current, next),
        });
    }

    let resolved_at = if next == IssueStatus::Resolved {
        Some(Utc::now())
    } else {
        None
    };

    sqlx::query("UPDATE health_issues SET status = $2, resolved_at = $3 WHERE id = $1")
        .bind(issue_id)
        .bind(next)
        .bind(resolved_at)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::plant::{create_plant, NewPlant};
    use crate::user;

    async fn seeded_issue(pool: &PgPool) -> HealthIssue {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(pool, &owner).await.unwrap();
        let plant = create_plant(
            pool,
            &NewPlant {
                user_id: owner.id,
                species_id: None,
                nickname: None,
                location_in_home: "kitchen".to_string(),
                light_exposure: "low".to_string(),
                watering_frequency_days: 10,
            },
        )
        .await
        .unwrap();

        create_issue(
            pool,
            &NewHealthIssue {
                plant_id: plant.id,
                name: "root rot".to_string(),
                description: "mushy stems".to_string(),
                confidence: 0.8,
                severity: "high".to_string(),
                treatments: vec![
                    "remove from pot".to_string(),
                    "trim affected roots".to_string(),
                    "repot in dry soil".to_string(),
                ],
            },
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_issue_with_ordered_steps(pool: PgPool) {
        let issue = seeded_issue(&pool).await;
        assert_eq!(issue.status, IssueStatus::Active);

        let steps = treatment_steps(&pool, issue.id).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].instruction, "remove from pot");
        assert_eq!(steps[2].instruction, "repot in dry soil");
    }

    #[sqlx::test]
    async fn test_lifecycle_transitions(pool: PgPool) {
        let issue = seeded_issue(&pool).await;

        set_status(&pool, issue.id, IssueStatus::Treating).await.unwrap();
        set_status(&pool, issue.id, IssueStatus::Resolved).await.unwrap();

        // Resolved is terminal.
        let result = set_status(&pool, issue.id, IssueStatus::Active).await;
        assert!(result.is_err());
    }

    #[sqlx::test]
    async fn test_skipping_treating_is_rejected(pool: PgPool) {
        let issue = seeded_issue(&pool).await;
        let result = set_status(&pool, issue.id, IssueStatus::Resolved).await;
        assert!(result.is_err());
    }
}
