//! Configuration for the Anthropic gateway.

use std::env;
use std::time::Duration;

use ai_core::{GatewayError, ModelTier};

/// Configuration for [`crate::ClaudeGateway`].
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API base URL.
    pub api_url: String,

    /// API key, sent in the `x-api-key` header.
    pub api_key: String,

    /// Model for the `simple` tier.
    pub model_simple: String,

    /// Model for the `complex` tier.
    pub model_complex: String,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Per-call timeout for the simple tier.
    pub timeout_simple: Duration,

    /// Per-call timeout for the complex tier.
    pub timeout_complex: Duration,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model_simple: "claude-3-5-haiku-20241022".to_string(),
            model_complex: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            timeout_simple: Duration::from_secs(15),
            timeout_complex: Duration::from_secs(30),
        }
    }
}

impl ClaudeConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ANTHROPIC_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `ANTHROPIC_API_URL` - API URL (default: https://api.anthropic.com)
    /// - `ANTHROPIC_MODEL_SIMPLE` - Simple-tier model
    /// - `ANTHROPIC_MODEL_COMPLEX` - Complex-tier model
    /// - `ANTHROPIC_MAX_TOKENS` - Max tokens (default: 1024)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| GatewayError::configuration("ANTHROPIC_API_KEY not set"))?;

        let defaults = Self::default();

        Ok(Self {
            api_url: env::var("ANTHROPIC_API_URL").unwrap_or(defaults.api_url),
            api_key,
            model_simple: env::var("ANTHROPIC_MODEL_SIMPLE").unwrap_or(defaults.model_simple),
            model_complex: env::var("ANTHROPIC_MODEL_COMPLEX").unwrap_or(defaults.model_complex),
            max_tokens: env::var("ANTHROPIC_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            timeout_simple: defaults.timeout_simple,
            timeout_complex: defaults.timeout_complex,
        })
    }

    /// Model for a tier.
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Simple => &self.model_simple,
            ModelTier::Complex => &self.model_complex,
        }
    }

    /// Per-call timeout for a tier.
    pub fn timeout_for(&self, tier: ModelTier) -> Duration {
        match tier {
            ModelTier::Simple => self.timeout_simple,
            ModelTier::Complex => self.timeout_complex,
        }
    }
}
