//! The chat pipeline: assemble context, pick a tier, route, persist, and
//! extract memories.
//!
//! Streaming follows the same structure, but aggregates are written only
//! when the stream completes; a mid-stream failure discards the draft
//! assistant message entirely.

use std::sync::Arc;
use std::time::Instant;

use ai_core::{
    AiTask, CancellationToken, ChatRequest, ChatStreamEvent, ChatTurn, GatewayError, ModelTier,
    TokenUsage,
};
use database::{memory as memory_repo, session, Database};
use futures::StreamExt;
use pgvector::Vector;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{AssembledContext, ContextAssembler};
use crate::cost::cost_usd;
use crate::error::OrchestratorError;
use crate::limiter::RateLimiter;
use crate::memory::extract_memories;
use crate::prompt::{render_system_prompt, render_user_turn};
use crate::router::AiRouter;

/// Query length above which chat escalates to the complex tier.
const COMPLEX_QUERY_CHARS: usize = 400;

/// Issue confidence at or above which chat escalates.
const COMPLEX_ISSUE_CONFIDENCE: f64 = 0.6;

/// Summary of what fed the model, returned to the client.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub history_messages: usize,
    pub memories_used: usize,
    pub plant_attached: bool,
}

/// A completed non-streaming chat turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    pub session_id: Uuid,
    pub content: String,
    pub action_items: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub context_used: ContextSummary,
    #[serde(skip)]
    pub provider: String,
    #[serde(skip)]
    pub model: String,
    #[serde(skip)]
    pub usage: TokenUsage,
}

/// One event surfaced to a streaming client, in emission order.
#[derive(Debug)]
pub enum ChatStreamItem {
    /// Stream accepted; the session (possibly newly created) is known.
    Start { session_id: Uuid },
    /// An incremental chunk of assistant text.
    Chunk(String),
    /// The exchange completed and was persisted.
    Done(Box<ChatOutcome>),
    /// The stream failed; nothing was persisted.
    Error(String),
}

/// Receiver half of a streaming chat call.
pub type ChatStreamHandle = mpsc::Receiver<ChatStreamItem>;

/// The chat pipeline.
pub struct ChatPipeline {
    router: Arc<AiRouter>,
    assembler: Arc<ContextAssembler>,
    db: Database,
    limiter: Arc<RateLimiter>,
}

impl ChatPipeline {
    pub fn new(
        router: Arc<AiRouter>,
        assembler: Arc<ContextAssembler>,
        db: Database,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            router,
            assembler,
            db,
            limiter,
        }
    }

    /// Decide the model tier for this turn.
    fn decide_tier(query: &str, context: &AssembledContext) -> ModelTier {
        if query.chars().count() > COMPLEX_QUERY_CHARS {
            return ModelTier::Complex;
        }
        if context
            .plant
            .as_ref()
            .map(|p| p.current_health.needs_attention())
            .unwrap_or(false)
        {
            return ModelTier::Complex;
        }
        if context
            .issues
            .iter()
            .any(|i| i.confidence >= COMPLEX_ISSUE_CONFIDENCE)
        {
            return ModelTier::Complex;
        }
        ModelTier::Simple
    }

    /// Shared front half: gates, session, context, request.
    async fn prepare(
        &self,
        user_id: Uuid,
        message: &str,
        plant_id: Option<Uuid>,
        session_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<(Uuid, AssembledContext, ChatRequest), OrchestratorError> {
        if message.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput("message is empty".to_string()));
        }

        self.limiter.check_window(user_id, "/api/v1/chat")?;
        self.limiter.check_quota(user_id, AiTask::ChatSimple).await?;

        let session = match session_id {
            Some(id) => session::get_session(self.db.pool(), user_id, id)
                .await
                .map_err(|e| OrchestratorError::from_lookup(e, "ConversationSession"))?,
            None => session::create_session(self.db.pool(), user_id, plant_id, None).await?,
        };

        let context = self
            .assembler
            .assemble(
                &self.router,
                user_id,
                message,
                plant_id.or(session.plant_id),
                Some(session.id),
                cancel,
            )
            .await?;

        let tier = Self::decide_tier(message, &context);
        debug!(tier = tier.as_str(), session = %session.id, "chat tier decided");

        let request = ChatRequest {
            system: render_system_prompt(context.user.as_ref()),
            turns: vec![ChatTurn::user(render_user_turn(&context.render(), message))],
            tier,
        };

        Ok((session.id, context, request))
    }

    /// Non-streaming chat.
    pub async fn run(
        &self,
        user_id: Uuid,
        message: &str,
        plant_id: Option<Uuid>,
        session_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let (session_id, context, request) = self
            .prepare(user_id, message, plant_id, session_id, cancel)
            .await?;

        let routed = self.router.chat(user_id, &request, cancel).await?;

        let outcome = self
            .finalize(
                user_id,
                session_id,
                message,
                &context,
                routed.value.content,
                routed.value.usage,
                &routed.provider,
                &routed.model,
                cancel,
            )
            .await?;

        info!(session = %outcome.session_id, provider = %outcome.provider, "chat turn complete");
        Ok(outcome)
    }

    /// Streaming chat. Chunks arrive on the returned channel in emission
    /// order; persistence happens once, after a successful `Done`.
    pub async fn run_stream(
        self: Arc<Self>,
        user_id: Uuid,
        message: String,
        plant_id: Option<Uuid>,
        session_id: Option<Uuid>,
        cancel: CancellationToken,
    ) -> Result<ChatStreamHandle, OrchestratorError> {
        let (prepared_session, context, request) = self
            .prepare(user_id, &message, plant_id, session_id, &cancel)
            .await?;

        let routed = self.router.chat_stream(user_id, &request, &cancel).await?;
        let provider = routed.provider;
        let model = routed.model;
        let task = request.tier.chat_task();

        let (tx, rx) = mpsc::channel(32);
        let pipeline = self.clone();

        tokio::spawn(async move {
            let _ = tx.send(ChatStreamItem::Start { session_id: prepared_session }).await;

            let started = Instant::now();
            let mut stream = routed.value;
            let mut draft = String::new();
            let mut usage = TokenUsage::default();
            let mut failed: Option<String> = None;

            loop {
                let event = tokio::select! {
                    event = stream.next() => event,
                    _ = cancel.cancelled() => {
                        failed = Some("cancelled".to_string());
                        break;
                    }
                };

                match event {
                    Some(Ok(ChatStreamEvent::Delta(chunk))) => {
                        draft.push_str(&chunk);
                        if tx.send(ChatStreamItem::Chunk(chunk)).await.is_err() {
                            // Client went away; treat like cancellation.
                            failed = Some("client disconnected".to_string());
                            break;
                        }
                    }
                    Some(Ok(ChatStreamEvent::Done(final_usage))) => {
                        usage = final_usage;
                        break;
                    }
                    Some(Err(e)) => {
                        failed = Some(e.to_string());
                        break;
                    }
                    None => break,
                }
            }

            if let Some(reason) = failed {
                // Draft discarded; the failure still gets its ledger row.
                warn!(%reason, "chat stream failed mid-flight");
                pipeline
                    .router
                    .record(
                        user_id,
                        task,
                        &provider,
                        &model,
                        None,
                        started.elapsed(),
                        Some(&GatewayError::service(reason.clone())),
                    )
                    .await;
                let _ = tx.send(ChatStreamItem::Error(reason)).await;
                return;
            }

            pipeline
                .router
                .record(user_id, task, &provider, &model, Some(usage), started.elapsed(), None)
                .await;

            match pipeline
                .finalize(
                    user_id,
                    prepared_session,
                    &message,
                    &context,
                    draft,
                    usage,
                    &provider,
                    &model,
                    &cancel,
                )
                .await
            {
                Ok(outcome) => {
                    let _ = tx.send(ChatStreamItem::Done(Box::new(outcome))).await;
                }
                Err(e) => {
                    warn!(error = %e, "stream persistence failed");
                    let _ = tx.send(ChatStreamItem::Error(e.to_string())).await;
                }
            }
        });

        Ok(rx)
    }

    /// Persist the exchange, extract memories, shape the outcome.
    #[allow(clippy::too_many_arguments)]
    async fn finalize(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        user_message: &str,
        context: &AssembledContext,
        assistant_content: String,
        usage: TokenUsage,
        provider: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, OrchestratorError> {
        let (content, structured) = split_structured_tail(&assistant_content);
        let action_items = string_list(structured.as_ref(), "actionItems");
        let follow_ups = string_list(structured.as_ref(), "followUpQuestions");

        session::append_exchange(
            self.db.pool(),
            user_id,
            session_id,
            &session::NewExchange {
                user_content: user_message.to_string(),
                assistant_content: content.clone(),
                input_tokens: usage.input_tokens as i32,
                output_tokens: usage.output_tokens as i32,
                model: model.to_string(),
                cost_usd: cost_usd(provider, model, Some(usage)),
                extracted: structured,
            },
        )
        .await?;

        self.store_memories(user_id, session_id, &content, cancel).await;

        Ok(ChatOutcome {
            session_id,
            content,
            action_items,
            follow_up_questions: follow_ups,
            context_used: ContextSummary {
                history_messages: context.history.len(),
                memories_used: context.memories.len(),
                plant_attached: context.plant.is_some(),
            },
            provider: provider.to_string(),
            model: model.to_string(),
            usage,
        })
    }

    /// Embed and insert memory candidates. Never fails the turn.
    async fn store_memories(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        assistant_content: &str,
        cancel: &CancellationToken,
    ) {
        let candidates = extract_memories(assistant_content);
        if candidates.is_empty() {
            return;
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let routed = match self.router.embed(user_id, &texts, cancel).await {
            Ok(routed) => routed,
            Err(e) => {
                warn!(error = %e, "memory embedding failed, skipping extraction");
                return;
            }
        };

        for (candidate, vector) in candidates.iter().zip(routed.value.vectors.iter()) {
            let embedding = Vector::from(vector.iter().map(|v| *v as f32).collect::<Vec<f32>>());
            if let Err(e) = memory_repo::insert_memory(
                self.db.pool(),
                user_id,
                Some(session_id),
                &candidate.content,
                candidate.content_type,
                embedding,
            )
            .await
            {
                warn!(error = %e, "memory insert failed");
            }
        }

        debug!(count = candidates.len(), "memories stored");
    }
}

/// Split a trailing fenced JSON object off assistant output.
///
/// Models are prompted to append `{"actionItems": [...],
/// "followUpQuestions": [...]}` in a final code fence; responses without
/// one pass through untouched.
fn split_structured_tail(content: &str) -> (String, Option<Value>) {
    let trimmed = content.trim_end();
    let Some(fence_start) = trimmed.rfind("```json") else {
        return (content.to_string(), None);
    };
    let after = &trimmed[fence_start + 7..];
    let Some(fence_end) = after.find("```") else {
        return (content.to_string(), None);
    };
    // Only a tail counts: nothing but the fence may follow.
    if !after[fence_end + 3..].trim().is_empty() {
        return (content.to_string(), None);
    }

    match serde_json::from_str::<Value>(after[..fence_end].trim()) {
        Ok(value) if value.is_object() => {
            let clean = trimmed[..fence_start].trim_end().to_string();
            (clean, Some(value))
        }
        _ => (content.to_string(), None),
    }
}

fn string_list(structured: Option<&Value>, key: &str) -> Vec<String> {
    structured
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use database::{HealthIssue, IssueStatus, Plant, PlantHealth};

    fn plant(health: PlantHealth) -> Plant {
        Plant {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            species_id: None,
            nickname: None,
            location_in_home: "desk".to_string(),
            light_exposure: "medium".to_string(),
            watering_frequency_days: 7,
            last_watered: None,
            next_water_due: None,
            last_fertilized: None,
            current_health: health,
            acquired_at: None,
            created_at: Utc::now(),
        }
    }

    fn issue(confidence: f64) -> HealthIssue {
        HealthIssue {
            id: Uuid::new_v4(),
            plant_id: Uuid::new_v4(),
            name: "leaf spot".to_string(),
            description: String::new(),
            confidence,
            severity: "moderate".to_string(),
            status: IssueStatus::Active,
            reported_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_short_query_healthy_plant_is_simple() {
        let context = AssembledContext {
            plant: Some(plant(PlantHealth::Healthy)),
            ..Default::default()
        };
        assert_eq!(ChatPipeline::decide_tier("water it?", &context), ModelTier::Simple);
    }

    #[test]
    fn test_long_query_escalates() {
        let context = AssembledContext::default();
        let long_query = "why ".repeat(150);
        assert_eq!(
            ChatPipeline::decide_tier(&long_query, &context),
            ModelTier::Complex
        );
    }

    #[test]
    fn test_struggling_plant_escalates() {
        let context = AssembledContext {
            plant: Some(plant(PlantHealth::Struggling)),
            ..Default::default()
        };
        assert_eq!(ChatPipeline::decide_tier("hi", &context), ModelTier::Complex);
    }

    #[test]
    fn test_confident_issue_escalates() {
        let context = AssembledContext {
            plant: Some(plant(PlantHealth::Healthy)),
            issues: vec![issue(0.6)],
            ..Default::default()
        };
        assert_eq!(ChatPipeline::decide_tier("hi", &context), ModelTier::Complex);
    }

    #[test]
    fn test_low_confidence_issue_stays_simple() {
        let context = AssembledContext {
            issues: vec![issue(0.59)],
            ..Default::default()
        };
        assert_eq!(ChatPipeline::decide_tier("hi", &context), ModelTier::Simple);
    }

    #[test]
    fn test_structured_tail_parsed_and_stripped() {
        let content = "Move it away from the vent.\n\n```json\n{\"actionItems\": [\"move plant\"], \"followUpQuestions\": [\"Is the soil dry?\"]}\n```";
        let (clean, structured) = split_structured_tail(content);

        assert_eq!(clean, "Move it away from the vent.");
        let structured = structured.unwrap();
        assert_eq!(string_list(Some(&structured), "actionItems"), vec!["move plant"]);
        assert_eq!(
            string_list(Some(&structured), "followUpQuestions"),
            vec!["Is the soil dry?"]
        );
    }

    #[test]
    fn test_response_without_tail_untouched() {
        let content = "Just water it weekly.";
        let (clean, structured) = split_structured_tail(content);
        assert_eq!(clean, content);
        assert!(structured.is_none());
    }

    #[test]
    fn test_mid_response_fence_is_not_a_tail() {
        let content = "Here is a schedule:\n```json\n{\"actionItems\": []}\n```\nFollow it daily.";
        let (clean, structured) = split_structured_tail(content);
        assert_eq!(clean, content);
        assert!(structured.is_none());
    }
}
