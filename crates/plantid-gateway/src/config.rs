//! Configuration for the Plant.id gateway.

use std::env;
use std::time::Duration;

use ai_core::GatewayError;

/// Configuration for [`crate::PlantIdGateway`].
#[derive(Debug, Clone)]
pub struct PlantIdConfig {
    /// API base URL.
    pub api_url: String,

    /// API key, sent in the `Api-Key` header.
    pub api_key: String,

    /// Per-call timeout.
    pub timeout: Duration,

    /// Ask the vendor for reference images alongside suggestions.
    pub request_similar_images: bool,
}

impl Default for PlantIdConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.plant.id".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(10),
            request_similar_images: true,
        }
    }
}

impl PlantIdConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `PLANT_ID_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `PLANT_ID_API_URL` - API URL (default: https://api.plant.id)
    /// - `PLANT_ID_TIMEOUT_SECS` - Per-call timeout (default: 10)
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = env::var("PLANT_ID_API_KEY")
            .map_err(|_| GatewayError::configuration("PLANT_ID_API_KEY not set"))?;

        let defaults = Self::default();

        let api_url = env::var("PLANT_ID_API_URL").unwrap_or(defaults.api_url);

        let timeout = env::var("PLANT_ID_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Ok(Self {
            api_url,
            api_key,
            timeout,
            request_similar_images: defaults.request_similar_images,
        })
    }
}
