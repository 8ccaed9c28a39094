//! Chat context assembly: parallel fan-out with a token budget.
//!
//! Four sub-fetches start together and join: user facts, plant facts with
//! recent issues, recent session history, and semantic memories found by
//! embedding the query. Each section is trimmed to its budget slice from
//! its low-priority end. Provider-class failures degrade a section to
//! empty; repository failures fail the assembly.

use pgvector::Vector;
use tracing::{debug, warn};
use uuid::Uuid;

use ai_core::CancellationToken;
use database::{health, memory, plant, session, user, Database, HealthIssue, Message, MessageRole, Plant, ScoredMemory, User};

use crate::error::OrchestratorError;
use crate::router::AiRouter;

/// Most history messages fetched before trimming.
const HISTORY_FETCH_LIMIT: i64 = 10;

/// Most memories fetched before trimming.
const MEMORY_FETCH_LIMIT: i64 = 5;

/// Most recent issues attached to the plant section.
const ISSUE_FETCH_LIMIT: i64 = 3;

/// Minimum cosine similarity for a memory to qualify.
pub const DEFAULT_SEMANTIC_THRESHOLD: f64 = 0.70;

/// Token slices per section. Trimming happens in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub user: usize,
    pub plant: usize,
    pub history: usize,
    pub memories: usize,
    /// Head-room for the prompt frame itself; never allocated to a section.
    pub reserve: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            user: 200,
            plant: 500,
            history: 2000,
            memories: 1000,
            reserve: 300,
        }
    }
}

impl TokenBudget {
    /// Create a budget from environment variables
    /// (`VERDANT_BUDGET_USER`, `_PLANT`, `_HISTORY`, `_MEMORIES`,
    /// `_RESERVE`), falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: usize| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            user: read("VERDANT_BUDGET_USER", defaults.user),
            plant: read("VERDANT_BUDGET_PLANT", defaults.plant),
            history: read("VERDANT_BUDGET_HISTORY", defaults.history),
            memories: read("VERDANT_BUDGET_MEMORIES", defaults.memories),
            reserve: read("VERDANT_BUDGET_RESERVE", defaults.reserve),
        }
    }
}

/// Deliberately approximate token estimate: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// The assembled, budget-trimmed context for one chat turn.
#[derive(Debug, Default)]
pub struct AssembledContext {
    pub user: Option<User>,
    pub user_facts: String,
    pub plant: Option<Plant>,
    pub plant_facts: String,
    pub issues: Vec<HealthIssue>,
    /// Oldest first, possibly truncated from the oldest end.
    pub history: Vec<Message>,
    /// Highest similarity first, possibly truncated from the lowest end.
    pub memories: Vec<ScoredMemory>,
}

impl AssembledContext {
    /// Pack the context into the prefix block of the user message.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if !self.user_facts.is_empty() {
            sections.push(format!("[ABOUT THE USER]\n{}", self.user_facts));
        }
        if !self.plant_facts.is_empty() {
            sections.push(format!("[ABOUT THE PLANT]\n{}", self.plant_facts));
        }
        if !self.history.is_empty() {
            let lines: Vec<String> = self
                .history
                .iter()
                .map(|m| {
                    let who = match m.role {
                        MessageRole::User => "U",
                        MessageRole::Assistant => "A",
                        MessageRole::System => "S",
                    };
                    format!("{}: {}", who, m.content)
                })
                .collect();
            sections.push(format!("[RECENT CONVERSATION]\n{}", lines.join("\n")));
        }
        if !self.memories.is_empty() {
            let lines: Vec<String> =
                self.memories.iter().map(|m| format!("- {}", m.content)).collect();
            sections.push(format!("[REMEMBERED]\n{}", lines.join("\n")));
        }

        sections.join("\n\n")
    }
}

/// Builds [`AssembledContext`] for the chat pipeline.
pub struct ContextAssembler {
    db: Database,
    semantic_threshold: f64,
    budget: TokenBudget,
}

impl ContextAssembler {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            budget: TokenBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_semantic_threshold(mut self, threshold: f64) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    /// Run the four sub-fetches in parallel and trim to budget.
    pub async fn assemble(
        &self,
        router: &AiRouter,
        user_id: Uuid,
        query: &str,
        plant_id: Option<Uuid>,
        session_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<AssembledContext, OrchestratorError> {
        let (user_result, plant_result, history_result, memories_result) = tokio::join!(
            self.fetch_user(user_id),
            self.fetch_plant(user_id, plant_id),
            self.fetch_history(session_id),
            self.fetch_memories(router, user_id, query, cancel),
        );

        let user = user_result?;
        let (plant, issues) = plant_result?;
        let history = history_result?;
        let memories = memories_result?;

        let mut context = AssembledContext {
            user_facts: render_user_facts(&user),
            user: Some(user),
            plant_facts: plant
                .as_ref()
                .map(|p| render_plant_facts(p, &issues))
                .unwrap_or_default(),
            plant,
            issues,
            history,
            memories,
        };
        self.trim(&mut context);
        Ok(context)
    }

    async fn fetch_user(&self, user_id: Uuid) -> Result<User, OrchestratorError> {
        user::get_user(self.db.pool(), user_id)
            .await
            .map_err(|e| OrchestratorError::from_lookup(e, "User"))
    }

    async fn fetch_plant(
        &self,
        user_id: Uuid,
        plant_id: Option<Uuid>,
    ) -> Result<(Option<Plant>, Vec<HealthIssue>), OrchestratorError> {
        let Some(plant_id) = plant_id else {
            return Ok((None, Vec::new()));
        };

        let plant = plant::get_plant(self.db.pool(), user_id, plant_id)
            .await
            .map_err(|e| OrchestratorError::from_lookup(e, "Plant"))?;
        let issues = health::active_issues(self.db.pool(), plant.id, ISSUE_FETCH_LIMIT).await?;
        Ok((Some(plant), issues))
    }

    async fn fetch_history(
        &self,
        session_id: Option<Uuid>,
    ) -> Result<Vec<Message>, OrchestratorError> {
        let Some(session_id) = session_id else {
            return Ok(Vec::new());
        };
        Ok(session::recent_messages(self.db.pool(), session_id, HISTORY_FETCH_LIMIT).await?)
    }

    /// Embed the query and search. An embedding outage yields an empty
    /// section; repository failures propagate.
    async fn fetch_memories(
        &self,
        router: &AiRouter,
        user_id: Uuid,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredMemory>, OrchestratorError> {
        let routed = match router.embed(user_id, &[query.to_string()], cancel).await {
            Ok(routed) => routed,
            Err(e) => {
                warn!(error = %e, "embedding unavailable, memories section empty");
                return Ok(Vec::new());
            }
        };

        let Some(vector) = routed.value.first() else {
            return Ok(Vec::new());
        };
        let query_vector = Vector::from(vector.iter().map(|v| *v as f32).collect::<Vec<f32>>());

        Ok(memory::search_memories(
            self.db.pool(),
            user_id,
            query_vector,
            self.semantic_threshold,
            MEMORY_FETCH_LIMIT,
        )
        .await?)
    }

    /// Enforce the budget, trimming user -> plant -> history -> memories.
    fn trim(&self, context: &mut AssembledContext) {
        context.user_facts = truncate_to_tokens(&context.user_facts, self.budget.user);
        context.plant_facts = truncate_to_tokens(&context.plant_facts, self.budget.plant);

        // History drops oldest first.
        while !context.history.is_empty() {
            let total: usize = context
                .history
                .iter()
                .map(|m| estimate_tokens(&m.content))
                .sum();
            if total <= self.budget.history {
                break;
            }
            context.history.remove(0);
            debug!("history over budget, dropped oldest message");
        }

        // Memories drop lowest similarity first; the fetch returns them
        // highest first, so trim the tail.
        while !context.memories.is_empty() {
            let total: usize = context
                .memories
                .iter()
                .map(|m| estimate_tokens(&m.content))
                .sum();
            if total <= self.budget.memories {
                break;
            }
            context.memories.pop();
            debug!("memories over budget, dropped least similar");
        }
    }
}

fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

fn render_user_facts(user: &User) -> String {
    let mut facts = vec![
        format!("Name: {}", user.display_name),
        format!(
            "Experience: {}",
            format!("{:?}", user.experience_level).to_lowercase()
        ),
    ];
    if let Some(city) = &user.city {
        facts.push(format!("City: {}", city));
    }
    if let Some(climate) = &user.climate_zone {
        facts.push(format!("Climate zone: {}", climate));
    }
    if let Some(home) = &user.home_type {
        facts.push(format!("Home: {}", home));
    }
    if let Some(light) = &user.light_level {
        facts.push(format!("Typical light: {}", light));
    }
    if let Some(humidity) = &user.humidity_level {
        facts.push(format!("Typical humidity: {}", humidity));
    }
    facts.join("\n")
}

fn render_plant_facts(plant: &Plant, issues: &[HealthIssue]) -> String {
    let mut facts = Vec::new();
    if let Some(nickname) = &plant.nickname {
        facts.push(format!("Nickname: {}", nickname));
    }
    facts.push(format!("Location: {}", plant.location_in_home));
    facts.push(format!("Light exposure: {}", plant.light_exposure));
    facts.push(format!(
        "Watering cadence: every {} days",
        plant.watering_frequency_days
    ));
    if let Some(last) = plant.last_watered {
        facts.push(format!("Last watered: {}", last.format("%Y-%m-%d")));
    }
    facts.push(format!(
        "Current health: {}",
        format!("{:?}", plant.current_health).to_lowercase()
    ));

    for issue in issues {
        facts.push(format!(
            "Issue ({:?}): {} - {}",
            issue.status, issue.name, issue.description
        ));
    }

    facts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role: MessageRole::User,
            content: content.to_string(),
            input_tokens: None,
            output_tokens: None,
            model: None,
            extracted: None,
            created_at: Utc::now(),
        }
    }

    fn memory(content: &str, similarity: f64) -> ScoredMemory {
        ScoredMemory {
            id: Uuid::new_v4(),
            content: content.to_string(),
            content_type: database::MemoryContentType::Advice,
            similarity,
            relevance_score: 1.0,
            created_at: Utc::now(),
        }
    }

    fn assembler_with_budget(budget: TokenBudget) -> ContextAssembler {
        // The trim logic never touches the pool; a lazy pool keeps these
        // tests connection-free.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        ContextAssembler::new(Database::from_pool(pool)).with_budget(budget)
    }

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_history_trims_oldest_first() {
        let assembler = assembler_with_budget(TokenBudget {
            history: 10, // 40 chars
            ..TokenBudget::default()
        });

        let mut context = AssembledContext {
            history: vec![
                message("oldest message that is fairly long"),
                message("middle message"),
                message("newest"),
            ],
            ..Default::default()
        };
        assembler.trim(&mut context);

        assert_eq!(context.history.len(), 2);
        assert_eq!(context.history[0].content, "middle message");
        assert_eq!(context.history[1].content, "newest");
    }

    #[test]
    fn test_memories_trim_lowest_similarity_first() {
        let assembler = assembler_with_budget(TokenBudget {
            memories: 10,
            ..TokenBudget::default()
        });

        let mut context = AssembledContext {
            memories: vec![
                memory("very relevant memory text", 0.95),
                memory("somewhat relevant memory", 0.8),
                memory("borderline memory", 0.71),
            ],
            ..Default::default()
        };
        assembler.trim(&mut context);

        assert!(!context.memories.is_empty());
        assert_eq!(context.memories[0].similarity, 0.95);
        // The tail (lowest similarity) went first.
        assert!(context.memories.iter().all(|m| m.similarity >= 0.8));
    }

    #[test]
    fn test_within_budget_untouched() {
        let assembler = assembler_with_budget(TokenBudget::default());
        let mut context = AssembledContext {
            history: vec![message("short"), message("also short")],
            memories: vec![memory("tiny", 0.9)],
            ..Default::default()
        };
        assembler.trim(&mut context);
        assert_eq!(context.history.len(), 2);
        assert_eq!(context.memories.len(), 1);
    }

    #[test]
    fn test_render_sections_in_order() {
        let context = AssembledContext {
            user_facts: "Name: Ada".to_string(),
            plant_facts: "Location: kitchen".to_string(),
            history: vec![message("is it thirsty?")],
            memories: vec![memory("bottom watering worked well", 0.9)],
            ..Default::default()
        };

        let rendered = context.render();
        let user_at = rendered.find("[ABOUT THE USER]").unwrap();
        let plant_at = rendered.find("[ABOUT THE PLANT]").unwrap();
        let history_at = rendered.find("[RECENT CONVERSATION]").unwrap();
        let memories_at = rendered.find("[REMEMBERED]").unwrap();
        assert!(user_at < plant_at && plant_at < history_at && history_at < memories_at);
        assert!(rendered.contains("U: is it thirsty?"));
    }

    #[test]
    fn test_render_skips_empty_sections() {
        let context = AssembledContext::default();
        assert_eq!(context.render(), "");
    }
}
