//! Database models.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Gardening experience level, set during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "experience_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Subscription tier controlling quota limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

/// Current health of a plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plant_health", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlantHealth {
    Thriving,
    Healthy,
    Struggling,
    Critical,
}

impl PlantHealth {
    /// Whether this state should escalate chat to the complex model tier.
    pub fn needs_attention(self) -> bool {
        matches!(self, PlantHealth::Struggling | PlantHealth::Critical)
    }
}

/// Care difficulty of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "care_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CareDifficulty {
    Easy,
    Moderate,
    Hard,
}

/// Lifecycle of a diagnosed health issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Active,
    Treating,
    Resolved,
    Recurring,
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// What a semantic memory was distilled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "memory_content_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemoryContentType {
    Conversation,
    Diagnosis,
    Advice,
    Outcome,
}

/// Photo category in the storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "photo_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Identification,
    Health,
    Progress,
}

impl PhotoKind {
    /// Key segment used in the storage layout.
    pub fn as_str(self) -> &'static str {
        match self {
            PhotoKind::Identification => "identification",
            PhotoKind::Health => "health",
            PhotoKind::Progress => "progress",
        }
    }
}

/// A user. Created by the auth collaborator; the core only reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub experience_level: ExperienceLevel,
    pub city: Option<String>,
    pub climate_zone: Option<String>,
    pub home_type: Option<String>,
    pub light_level: Option<String>,
    pub humidity_level: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
}

/// A canonical species row, unique per normalized scientific name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Species {
    pub id: Uuid,
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub genus: String,
    pub light: Option<String>,
    pub water_frequency: Option<String>,
    pub humidity: Option<String>,
    pub temperature: Option<String>,
    pub difficulty: CareDifficulty,
    pub toxicity: Option<String>,
    pub description: Option<String>,
    pub plant_id_species_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields to insert for a new species row.
#[derive(Debug, Clone, Default)]
pub struct NewSpecies {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub genus: String,
    pub toxicity: Option<String>,
    pub description: Option<String>,
    pub plant_id_species_id: Option<String>,
}

/// Enrichment updates for an existing species row. Only non-`None` fields
/// are written; `common_names` replaces the stored array when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesEnrichment {
    pub common_names: Option<Vec<String>>,
    pub toxicity: Option<String>,
    pub description: Option<String>,
    pub plant_id_species_id: Option<String>,
}

impl SpeciesEnrichment {
    pub fn is_empty(&self) -> bool {
        self.common_names.is_none()
            && self.toxicity.is_none()
            && self.description.is_none()
            && self.plant_id_species_id.is_none()
    }
}

/// A user-owned plant instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Plant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub species_id: Option<Uuid>,
    pub nickname: Option<String>,
    pub location_in_home: String,
    pub light_exposure: String,
    pub watering_frequency_days: i32,
    pub last_watered: Option<DateTime<Utc>>,
    pub next_water_due: Option<DateTime<Utc>>,
    pub last_fertilized: Option<DateTime<Utc>>,
    pub current_health: PlantHealth,
    pub acquired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A diagnosed health issue on a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HealthIssue {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub name: String,
    pub description: String,
    pub confidence: f64,
    pub severity: String,
    pub status: IssueStatus,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One ordered step in a treatment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TreatmentStep {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub step_order: i32,
    pub instruction: String,
    pub completed: bool,
}

/// A per-user chat thread, optionally tied to a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConversationSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plant_id: Option<Uuid>,
    pub title: Option<String>,
    pub message_count: i32,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub estimated_cost: f64,
    pub models_used: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ordered child of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub model: Option<String>,
    /// Structured data extracted from assistant output: action items,
    /// referenced plants, identified issues.
    pub extracted: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A per-user embedding with its source excerpt.
#[derive(Debug, Clone, FromRow)]
pub struct SemanticMemory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub content: String,
    pub content_type: MemoryContentType,
    pub embedding: Vector,
    pub relevance_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A memory returned from a similarity search, with its cosine similarity
/// and lazily decayed relevance.
#[derive(Debug, Clone, FromRow)]
pub struct ScoredMemory {
    pub id: Uuid,
    pub content: String,
    pub content_type: MemoryContentType,
    pub similarity: f64,
    pub relevance_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A scheduled care reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plant_id: Uuid,
    pub kind: String,
    pub due_date: DateTime<Utc>,
    /// Recurrence multiplier (e.g. every 2 weeks -> frequency 2,
    /// interval_unit "week"). `None` means one-shot.
    pub frequency: Option<i32>,
    pub interval_unit: Option<String>,
    pub completed: bool,
    pub skipped: bool,
    pub created_at: DateTime<Utc>,
}

/// One provider attempt in the append-only usage ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UsageLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub latency_ms: i64,
    pub success: bool,
    pub error_code: Option<String>,
    pub cost_usd: f64,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

/// Fields to insert for a new ledger row.
#[derive(Debug, Clone)]
pub struct NewUsageLogEntry {
    pub user_id: Uuid,
    pub action: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub latency_ms: i64,
    pub success: bool,
    pub error_code: Option<String>,
    pub cost_usd: f64,
    pub endpoint: String,
}

/// A stored photo reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlantPhoto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plant_id: Option<Uuid>,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub kind: PhotoKind,
    pub created_at: DateTime<Utc>,
}
