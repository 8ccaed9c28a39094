//! Semantic memory operations.
//!
//! Memories are 1536-dim embeddings searched by cosine distance through
//! the ivfflat index. Relevance decays lazily at read time; nothing
//! rewrites stored scores.

use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{MemoryContentType, ScoredMemory, SemanticMemory};

/// Daily multiplicative decay applied to relevance at read time.
const RELEVANCE_DECAY_PER_DAY: f64 = 0.99;

/// Insert a memory with full relevance.
pub async fn insert_memory(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Option<Uuid>,
    content: &str,
    content_type: MemoryContentType,
    embedding: Vector,
) -> Result<SemanticMemory> {
    let memory = sqlx::query_as::<_, SemanticMemory>(
        r#"
        INSERT INTO semantic_memories (user_id, session_id, content, content_type, embedding)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, session_id, content, content_type, embedding,
                  relevance_score, created_at
        "#,
    )
    .bind(user_id)
    .bind(session_id)
    .bind(content)
    .bind(content_type)
    .bind(embedding)
    .fetch_one(pool)
    .await?;

    Ok(memory)
}

/// Cosine similarity search over a user's memories.
///
/// Returns up to `limit` rows with `1 - cosine_distance >= min_similarity`,
/// ordered by similarity descending. The returned `relevance_score` is the
/// stored score decayed by age.
pub async fn search_memories(
    pool: &PgPool,
    user_id: Uuid,
    query_embedding: Vector,
    min_similarity: f64,
    limit: i64,
) -> Result<Vec<ScoredMemory>> {
    let memories = sqlx::query_as::<_, ScoredMemory>(
        r#"
        SELECT id, content, content_type,
               1 - (embedding <=> $2) AS similarity,
               relevance_score * power($5, extract(epoch FROM (now() - created_at)) / 86400.0)
                   AS relevance_score,
               created_at
        FROM semantic_memories
        WHERE user_id = $1 AND 1 - (embedding <=> $2) >= $3
        ORDER BY embedding <=> $2
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(query_embedding)
    .bind(min_similarity)
    .bind(limit)
    .bind(RELEVANCE_DECAY_PER_DAY)
    .fetch_all(pool)
    .await?;

    Ok(memories)
}

/// Count a user's memories (used by retention checks and tests).
pub async fn count_memories(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM semantic_memories WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::user;

    fn unit_vector(hot_index: usize) -> Vector {
        let mut v = vec![0.0f32; 1536];
        v[hot_index] = 1.0;
        Vector::from(v)
    }

    #[sqlx::test]
    async fn test_similarity_search_filters_and_orders(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();

        // One aligned memory, one orthogonal.
        insert_memory(
            &pool,
            owner.id,
            None,
            "fungus gnats cleared after bottom watering",
            MemoryContentType::Outcome,
            unit_vector(0),
        )
        .await
        .unwrap();
        insert_memory(
            &pool,
            owner.id,
            None,
            "prefers morning light",
            MemoryContentType::Advice,
            unit_vector(1),
        )
        .await
        .unwrap();

        let hits = search_memories(&pool, owner.id, unit_vector(0), 0.7, 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity > 0.99);
        assert_eq!(hits[0].content_type, MemoryContentType::Outcome);
        // Fresh memory: decay has not meaningfully reduced relevance.
        assert!(hits[0].relevance_score > 0.99);
    }

    #[sqlx::test]
    async fn test_search_scoped_to_user(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        let other = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();
        user::create_user(&pool, &other).await.unwrap();

        insert_memory(
            &pool,
            other.id,
            None,
            "someone else's plant",
            MemoryContentType::Conversation,
            unit_vector(0),
        )
        .await
        .unwrap();

        let hits = search_memories(&pool, owner.id, unit_vector(0), 0.5, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[sqlx::test]
    async fn test_cascade_on_user_delete(pool: PgPool) {
        let owner = user::test_user(SubscriptionTier::Free);
        user::create_user(&pool, &owner).await.unwrap();
        insert_memory(
            &pool,
            owner.id,
            None,
            "anything",
            MemoryContentType::Diagnosis,
            unit_vector(2),
        )
        .await
        .unwrap();

        user::delete_user(&pool, owner.id).await.unwrap();
        assert_eq!(count_memories(&pool, owner.id).await.unwrap(), 0);
    }
}
