//! GeminiGateway implementation.

use ai_core::{
    async_trait, first_json_as, GatewayError, Identification, IdentifyProvider, SpeciesCandidate,
    UNKNOWN,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

/// Provider name recorded in the usage ledger.
const PROVIDER_NAME: &str = "gemini";

/// Instruction that pins the response to a single JSON object.
const IDENTIFY_PROMPT: &str = "You are a botanist. Identify the plant in the image(s). \
Respond with exactly one JSON object and nothing else, in this shape: \
{\"scientificName\": string, \"commonNames\": string[], \"family\": string, \
\"genus\": string, \"confidence\": number between 0 and 1}. \
If you cannot identify a plant, use \"Unknown\" for names and 0 for confidence.";

/// The JSON object the prompt asks the model to emit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionIdentification {
    #[serde(default)]
    scientific_name: String,
    #[serde(default)]
    common_names: Vec<String>,
    #[serde(default)]
    family: String,
    #[serde(default)]
    genus: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Vision fallback gateway over the Gemini `generateContent` API.
///
/// No sockets are opened at construction.
pub struct GeminiGateway {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("verdant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Create a gateway from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.api_url, self.config.model, self.config.api_key
        )
    }

    fn build_request(&self, images: &[String]) -> serde_json::Value {
        let mut parts = vec![json!({ "text": IDENTIFY_PROMPT })];
        for image in images {
            parts.push(json!({
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": image,
                }
            }));
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "temperature": 0.0 },
        })
    }

    /// Map the model's text output to a candidate.
    ///
    /// Parse failures return the sentinel low-confidence result rather
    /// than an error; an unidentifiable image is an answer, not an outage.
    fn parse_identification(text: &str) -> SpeciesCandidate {
        match first_json_as::<VisionIdentification>(text) {
            Some(parsed) => {
                let name = |s: String| if s.is_empty() { UNKNOWN.to_string() } else { s };
                SpeciesCandidate {
                    scientific_name: name(parsed.scientific_name),
                    common_names: parsed.common_names,
                    family: name(parsed.family),
                    genus: name(parsed.genus),
                    confidence: parsed.confidence.clamp(0.0, 1.0),
                    similar_image_url: None,
                    provider_species_id: None,
                    description: None,
                    toxicity: None,
                }
            }
            None => {
                warn!("vision response carried no parseable JSON object, using sentinel");
                SpeciesCandidate::unknown()
            }
        }
    }
}

#[async_trait]
impl IdentifyProvider for GeminiGateway {
    async fn identify(&self, images: &[String]) -> Result<Identification, GatewayError> {
        let request = self.build_request(images);

        debug!(image_count = images.len(), "sending vision identification request");
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = ai_core::retry_after_from_headers(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &body, retry_after));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            GatewayError::invalid_response(format!("failed to parse response: {}", e))
        })?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("");

        let top = Self::parse_identification(text);

        // The vision fallback never emits alternatives; one hypothesis is
        // all the prompt asks for.
        Ok(Identification {
            is_plant: top.confidence > 0.0,
            top,
            alternatives: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
