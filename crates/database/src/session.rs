//! Conversation session and message operations.
//!
//! Message appends and session aggregate updates always travel in one
//! transaction, so `session.message_count` equals the number of stored
//! messages at every commit point.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{ConversationSession, Message, MessageRole};

const SESSION_COLUMNS: &str = "id, user_id, plant_id, title, message_count, total_input_tokens, \
     total_output_tokens, estimated_cost, models_used, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, session_id, role, content, input_tokens, output_tokens, model, extracted, created_at";

/// A finished user/assistant exchange ready to persist.
#[derive(Debug, Clone)]
pub struct NewExchange {
    pub user_content: String,
    pub assistant_content: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub model: String,
    pub cost_usd: f64,
    /// Structured tail extracted from the assistant output, if any.
    pub extracted: Option<serde_json::Value>,
}

/// Create a session for a user, optionally tied to a plant.
pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    plant_id: Option<Uuid>,
    title: Option<&str>,
) -> Result<ConversationSession> {
    let session = sqlx::query_as::<_, ConversationSession>(&format!(
        r#"
        INSERT INTO conversation_sessions (user_id, plant_id, title)
        VALUES ($1, $2, $3)
        RETURNING {SESSION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(plant_id)
    .bind(title)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Get a session owned by a user.
pub async fn get_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<ConversationSession> {
    sqlx::query_as::<_, ConversationSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM conversation_sessions WHERE id = $1 AND user_id = $2"
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "ConversationSession",
        id: session_id.to_string(),
    })
}

/// The last `limit` messages of a session, re-ordered oldest first.
pub async fn recent_messages(pool: &PgPool, session_id: Uuid, limit: i64) -> Result<Vec<Message>> {
    let mut messages = sqlx::query_as::<_, Message>(&format!(
        r#"
        SELECT {MESSAGE_COLUMNS}
        FROM messages
        WHERE session_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#
    ))
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Append a user/assistant exchange and update the session aggregates
/// atomically.
///
/// The user message is inserted first so `created_at` ordering matches
/// emit order. Returns the assistant message.
pub async fn append_exchange(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
    exchange: &NewExchange,
) -> Result<Message> {
    let mut tx = pool.begin().await?;

    // Ownership check inside the transaction; a foreign session behaves
    // like a missing one.
    let owned: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM conversation_sessions WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if owned.is_none() {
        return Err(DatabaseError::NotFound {
            entity: "ConversationSession",
            id: session_id.to_string(),
        });
    }

    sqlx::query("INSERT INTO messages (session_id, role, content) VALUES ($1, $2, $3)")
        .bind(session_id)
        .bind(MessageRole::User)
        .bind(&exchange.user_content)
        .execute(&mut *tx)
        .await?;

    let assistant = sqlx::query_as::<_, Message>(&format!(
        r#"
        INSERT INTO messages (session_id, role, content, input_tokens, output_tokens,
                              model, extracted)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {MESSAGE_COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(MessageRole::Assistant)
    .bind(&exchange.assistant_content)
    .bind(exchange.input_tokens)
    .bind(exchange.output_tokens)
    .bind(&exchange.model)
    .bind(&exchange.extracted)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE conversation_sessions
        SET message_count = message_count + 2,
            total_input_tokens = total_input_tokens + $2,
            total_output_tokens = total_output_tokens + $3,
            estimated_cost = estimated_cost + $4,
            models_used = CASE WHEN $5 = ANY(models_used) THEN models_used
                               ELSE array_append(models_used, $5) END,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(exchange.input_tokens as i64)
    .bind(exchange.output_tokens as i64)
    .bind(exchange.cost_usd)
    .bind(&exchange.model)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::user;

    async fn seeded_session(pool: &PgPool) -> ConversationSession {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(pool, &owner).await.unwrap();
        create_session(pool, owner.id, None, Some("repotting help")).await.unwrap()
    }

    fn exchange(model: &str) -> NewExchange {
        NewExchange {
            user_content: "how often should I water?".to_string(),
            assistant_content: "Once a week in summer.".to_string(),
            input_tokens: 120,
            output_tokens: 40,
            model: model.to_string(),
            cost_usd: 0.0012,
            extracted: None,
        }
    }

    #[sqlx::test]
    async fn test_append_updates_aggregates_atomically(pool: PgPool) {
        let session = seeded_session(&pool).await;

        append_exchange(&pool, session.user_id, session.id, &exchange("haiku"))
            .await
            .unwrap();
        append_exchange(&pool, session.user_id, session.id, &exchange("sonnet"))
            .await
            .unwrap();

        let updated = get_session(&pool, session.user_id, session.id).await.unwrap();
        assert_eq!(updated.message_count, 4);
        assert_eq!(updated.total_input_tokens, 240);
        assert_eq!(updated.total_output_tokens, 80);
        assert!((updated.estimated_cost - 0.0024).abs() < 1e-9);
        assert_eq!(updated.models_used, vec!["haiku".to_string(), "sonnet".to_string()]);

        // Invariant: message_count matches the stored rows.
        let messages = recent_messages(&pool, session.id, 50).await.unwrap();
        assert_eq!(messages.len(), updated.message_count as usize);
    }

    #[sqlx::test]
    async fn test_models_used_is_a_set(pool: PgPool) {
        let session = seeded_session(&pool).await;

        append_exchange(&pool, session.user_id, session.id, &exchange("haiku"))
            .await
            .unwrap();
        append_exchange(&pool, session.user_id, session.id, &exchange("haiku"))
            .await
            .unwrap();

        let updated = get_session(&pool, session.user_id, session.id).await.unwrap();
        assert_eq!(updated.models_used, vec!["haiku".to_string()]);
    }

    #[sqlx::test]
    async fn test_messages_ordered_user_then_assistant(pool: PgPool) {
        let session = seeded_session(&pool).await;
        append_exchange(&pool, session.user_id, session.id, &exchange("haiku"))
            .await
            .unwrap();

        let messages = recent_messages(&pool, session.id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages[0].created_at < messages[1].created_at);
    }

    #[sqlx::test]
    async fn test_recent_messages_truncates_oldest(pool: PgPool) {
        let session = seeded_session(&pool).await;
        for _ in 0..6 {
            append_exchange(&pool, session.user_id, session.id, &exchange("haiku"))
                .await
                .unwrap();
        }

        let messages = recent_messages(&pool, session.id, 10).await.unwrap();
        assert_eq!(messages.len(), 10);
        // Oldest-to-newest ordering after truncation.
        for pair in messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[sqlx::test]
    async fn test_foreign_session_rejected(pool: PgPool) {
        let session = seeded_session(&pool).await;
        let stranger = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &stranger).await.unwrap();

        let result = append_exchange(&pool, stranger.id, session.id, &exchange("haiku")).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }
}
