//! Configuration for the Gemini gateway.

use std::env;
use std::time::Duration;

use ai_core::GatewayError;

/// Configuration for [`crate::GeminiGateway`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API base URL.
    pub api_url: String,

    /// API key, appended as the `key` query parameter.
    pub api_key: String,

    /// Vision-capable model name.
    pub model: String,

    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl GeminiConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `GEMINI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `GEMINI_API_URL` - API URL (default: https://generativelanguage.googleapis.com)
    /// - `GEMINI_MODEL` - Model name (default: gemini-1.5-flash)
    /// - `GEMINI_TIMEOUT_SECS` - Per-call timeout (default: 15)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| GatewayError::configuration("GEMINI_API_KEY not set"))?;

        let defaults = Self::default();

        Ok(Self {
            api_url: env::var("GEMINI_API_URL").unwrap_or(defaults.api_url),
            api_key,
            model: env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            timeout: env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
    }
}
