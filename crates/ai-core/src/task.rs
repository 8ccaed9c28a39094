//! Semantic task vocabulary shared by the router, ledger, and limiter.

use serde::{Deserialize, Serialize};

/// A semantic unit of AI work. Each task has its own provider chain and
/// its own quota bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTask {
    Identification,
    HealthAssessment,
    ChatSimple,
    ChatComplex,
    Embedding,
}

impl AiTask {
    /// Stable label used in usage ledger rows and quota lookups.
    pub fn as_str(self) -> &'static str {
        match self {
            AiTask::Identification => "identification",
            AiTask::HealthAssessment => "health_assessment",
            AiTask::ChatSimple => "chat_simple",
            AiTask::ChatComplex => "chat_complex",
            AiTask::Embedding => "embedding",
        }
    }

    /// The quota bucket this task counts against. Both chat tiers share
    /// one monthly allowance.
    pub fn quota_feature(self) -> &'static str {
        match self {
            AiTask::Identification => "identification",
            AiTask::HealthAssessment => "health_assessment",
            AiTask::ChatSimple | AiTask::ChatComplex => "chat",
            AiTask::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for AiTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model tier for conversational providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Fast, cheap model for routine questions.
    Simple,
    /// Stronger model for long queries and plants in trouble.
    Complex,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Simple => "simple",
            ModelTier::Complex => "complex",
        }
    }

    /// The chat task this tier maps to.
    pub fn chat_task(self) -> AiTask {
        match self {
            ModelTier::Simple => AiTask::ChatSimple,
            ModelTier::Complex => AiTask::ChatComplex,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_labels() {
        assert_eq!(AiTask::Identification.as_str(), "identification");
        assert_eq!(AiTask::HealthAssessment.as_str(), "health_assessment");
        assert_eq!(AiTask::ChatSimple.as_str(), "chat_simple");
        assert_eq!(AiTask::ChatComplex.as_str(), "chat_complex");
        assert_eq!(AiTask::Embedding.as_str(), "embedding");
    }

    #[test]
    fn test_chat_tiers_share_quota_feature() {
        assert_eq!(AiTask::ChatSimple.quota_feature(), "chat");
        assert_eq!(AiTask::ChatComplex.quota_feature(), "chat");
    }

    #[test]
    fn test_tier_to_task() {
        assert_eq!(ModelTier::Simple.chat_task(), AiTask::ChatSimple);
        assert_eq!(ModelTier::Complex.chat_task(), AiTask::ChatComplex);
    }
}
