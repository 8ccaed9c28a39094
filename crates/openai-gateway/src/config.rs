//! Configuration for the OpenAI gateway.

use std::env;
use std::time::Duration;

use ai_core::GatewayError;

/// Configuration for [`crate::OpenAiGateway`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API base URL.
    pub api_url: String,

    /// API key, sent as a bearer token.
    pub api_key: String,

    /// Chat model used when this gateway serves as the fallback.
    pub chat_model: String,

    /// Embedding model. Must emit 1536-dimension vectors.
    pub embedding_model: String,

    /// Maximum tokens for chat responses.
    pub max_tokens: u32,

    /// Per-call timeout for chat.
    pub chat_timeout: Duration,

    /// Per-call timeout for embeddings.
    pub embedding_timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            max_tokens: 1024,
            chat_timeout: Duration::from_secs(15),
            embedding_timeout: Duration::from_secs(5),
        }
    }
}

impl OpenAiConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OPENAI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `OPENAI_API_URL` - API URL (default: https://api.openai.com)
    /// - `OPENAI_CHAT_MODEL` - Chat model (default: gpt-4o-mini)
    /// - `OPENAI_EMBEDDING_MODEL` - Embedding model (default: text-embedding-3-small)
    /// - `OPENAI_MAX_TOKENS` - Max tokens (default: 1024)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| GatewayError::configuration("OPENAI_API_KEY not set"))?;

        let defaults = Self::default();

        Ok(Self {
            api_url: env::var("OPENAI_API_URL").unwrap_or(defaults.api_url),
            api_key,
            chat_model: env::var("OPENAI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: env::var("OPENAI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            max_tokens: env::var("OPENAI_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            chat_timeout: defaults.chat_timeout,
            embedding_timeout: defaults.embedding_timeout,
        })
    }
}
