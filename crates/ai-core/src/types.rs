//! Internal result shapes returned by provider gateways.
//!
//! Each gateway parses its vendor payload into these types; the router
//! annotates them with provenance before handing them to the pipelines.
//! Fields absent from a vendor payload default explicitly: strings to
//! `"Unknown"`, arrays to empty, confidence to `0`.

use serde::{Deserialize, Serialize};

use crate::task::ModelTier;

/// Placeholder for string fields a vendor did not supply.
pub const UNKNOWN: &str = "Unknown";

/// One species hypothesis from an identification provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCandidate {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub genus: String,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f64,
    /// Most similar reference image, when the vendor shares one.
    pub similar_image_url: Option<String>,
    /// Vendor-side species identifier, used for catalog enrichment.
    pub provider_species_id: Option<String>,
    /// Care description, when the vendor shares one.
    pub description: Option<String>,
    /// Toxicity note, when the vendor shares one.
    pub toxicity: Option<String>,
}

impl SpeciesCandidate {
    /// A sentinel candidate for unparseable vendor output.
    pub fn unknown() -> Self {
        Self {
            scientific_name: UNKNOWN.to_string(),
            common_names: Vec::new(),
            family: UNKNOWN.to_string(),
            genus: UNKNOWN.to_string(),
            confidence: 0.0,
            similar_image_url: None,
            provider_species_id: None,
            description: None,
            toxicity: None,
        }
    }
}

/// Result of an identification call: the best suggestion plus up to four
/// alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Vendor signal that the images contain a plant at all.
    pub is_plant: bool,
    pub top: SpeciesCandidate,
    pub alternatives: Vec<SpeciesCandidate>,
}

/// A diagnosed problem with ordered treatment suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedIssue {
    pub name: String,
    pub description: String,
    /// Provider confidence in `[0, 1]`.
    pub confidence: f64,
    /// Qualitative severity as reported by the provider.
    pub severity: String,
    /// Treatment steps in application order.
    pub treatments: Vec<String>,
}

/// Result of a health assessment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub is_healthy: bool,
    /// Issues ranked by confidence, highest first.
    pub issues: Vec<RankedIssue>,
}

/// Token accounting reported by a conversational or embedding provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Message role in a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One turn in the conversation passed to a chat provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A conversational request: system prompt plus ordered turns.
///
/// The tier is advisory; router chain entries may override it so the
/// complex chain can degrade to the simple model before switching vendors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub turns: Vec<ChatTurn>,
    pub tier: ModelTier,
}

/// Completed (non-streaming) chat result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// One event from a streaming chat call, delivered in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// An incremental text chunk.
    Delta(String),
    /// The stream finished; carries the final usage tuple.
    Done(TokenUsage),
}

/// A 1536-dimension embedding vector with its token count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub vectors: Vec<Vec<f64>>,
    pub usage: TokenUsage,
}

impl Embedding {
    /// The single vector of a one-element batch.
    pub fn first(&self) -> Option<&[f64]> {
        self.vectors.first().map(|v| v.as_slice())
    }
}
