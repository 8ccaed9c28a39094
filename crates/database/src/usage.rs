//! Usage ledger operations.
//!
//! The ledger is append-only; every provider attempt becomes exactly one
//! row. Aggregations here back the monthly quota checks.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewUsageLogEntry, UsageLogEntry};

const USAGE_COLUMNS: &str = "id, user_id, action, provider, model, input_tokens, output_tokens, \
     latency_ms, success, error_code, cost_usd, endpoint, created_at";

/// Append one ledger row.
pub async fn insert_entry(pool: &PgPool, entry: &NewUsageLogEntry) -> Result<UsageLogEntry> {
    let row = sqlx::query_as::<_, UsageLogEntry>(&format!(
        r#"
        INSERT INTO usage_logs (user_id, action, provider, model, input_tokens, output_tokens,
                                latency_ms, success, error_code, cost_usd, endpoint)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {USAGE_COLUMNS}
        "#
    ))
    .bind(entry.user_id)
    .bind(&entry.action)
    .bind(&entry.provider)
    .bind(&entry.model)
    .bind(entry.input_tokens)
    .bind(entry.output_tokens)
    .bind(entry.latency_ms)
    .bind(entry.success)
    .bind(&entry.error_code)
    .bind(entry.cost_usd)
    .bind(&entry.endpoint)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Count successful attempts for `(user, action)` inside a window.
///
/// Quota features may span several task labels (both chat tiers count
/// against "chat"), so `actions` is a list.
pub async fn success_count_in_window(
    pool: &PgPool,
    user_id: Uuid,
    actions: &[String],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT count(*)
        FROM usage_logs
        WHERE user_id = $1
          AND action = ANY($2)
          AND success = true
          AND created_at >= $3
          AND created_at < $4
        "#,
    )
    .bind(user_id)
    .bind(actions)
    .bind(window_start)
    .bind(window_end)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// All rows for a user and action, newest first (used by tests and the
/// admin surface).
pub async fn entries_for_action(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
) -> Result<Vec<UsageLogEntry>> {
    let rows = sqlx::query_as::<_, UsageLogEntry>(&format!(
        r#"
        SELECT {USAGE_COLUMNS}
        FROM usage_logs
        WHERE user_id = $1 AND action = $2
        ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .bind(action)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Total spend for a user in a window.
pub async fn total_cost_in_window(
    pool: &PgPool,
    user_id: Uuid,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<f64> {
    let (total,): (Option<f64>,) = sqlx::query_as(
        r#"
        SELECT sum(cost_usd)
        FROM usage_logs
        WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
        "#,
    )
    .bind(user_id)
    .bind(window_start)
    .bind(window_end)
    .fetch_one(pool)
    .await?;

    Ok(total.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::user;
    use chrono::Duration;

    fn entry(user_id: Uuid, action: &str, success: bool) -> NewUsageLogEntry {
        NewUsageLogEntry {
            user_id,
            action: action.to_string(),
            provider: "plant-id".to_string(),
            model: "plant-id-v3".to_string(),
            input_tokens: None,
            output_tokens: None,
            latency_ms: 850,
            success,
            error_code: if success { None } else { Some("SERVICE_ERROR".to_string()) },
            cost_usd: 0.05,
            endpoint: "/api/v1/identify".to_string(),
        }
    }

    #[sqlx::test]
    async fn test_window_count_only_successes(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();

        for _ in 0..3 {
            insert_entry(&pool, &entry(owner.id, "identification", true)).await.unwrap();
        }
        insert_entry(&pool, &entry(owner.id, "identification", false)).await.unwrap();
        insert_entry(&pool, &entry(owner.id, "chat_simple", true)).await.unwrap();

        let now = Utc::now();
        let count = success_count_in_window(
            &pool,
            owner.id,
            &["identification".to_string()],
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .await
        .unwrap();
        assert_eq!(count, 3);
    }

    #[sqlx::test]
    async fn test_window_count_spans_actions(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();

        insert_entry(&pool, &entry(owner.id, "chat_simple", true)).await.unwrap();
        insert_entry(&pool, &entry(owner.id, "chat_complex", true)).await.unwrap();

        let now = Utc::now();
        let count = success_count_in_window(
            &pool,
            owner.id,
            &["chat_simple".to_string(), "chat_complex".to_string()],
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[sqlx::test]
    async fn test_cost_aggregation(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();

        insert_entry(&pool, &entry(owner.id, "identification", true)).await.unwrap();
        insert_entry(&pool, &entry(owner.id, "identification", false)).await.unwrap();

        let now = Utc::now();
        let total = total_cost_in_window(
            &pool,
            owner.id,
            now - Duration::hours(1),
            now + Duration::hours(1),
        )
        .await
        .unwrap();
        assert!((total - 0.10).abs() < 1e-9);
    }
}
