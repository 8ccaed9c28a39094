//! PlantIdGateway implementation.

use ai_core::{
    async_trait, GatewayError, HealthAssessment, HealthProvider, Identification,
    IdentifyProvider, RankedIssue, SpeciesCandidate, UNKNOWN,
};
use reqwest::Client;
use tracing::{debug, warn};

use crate::api_types::{
    ApiError, DiseaseSuggestion, HealthRequest, HealthResponse, IdentificationRequest,
    IdentificationResponse, Suggestion,
};
use crate::config::PlantIdConfig;

/// Provider name recorded in the usage ledger.
const PROVIDER_NAME: &str = "plant-id";

/// Most alternatives kept beyond the top suggestion.
const MAX_ALTERNATIVES: usize = 4;

/// Gateway to the Plant.id identification and health assessment API.
///
/// Construction builds the HTTP client but opens no sockets; the first
/// call pays the connection cost.
pub struct PlantIdGateway {
    client: Client,
    config: PlantIdConfig,
}

impl PlantIdGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: PlantIdConfig) -> Result<Self, GatewayError> {
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
        Self::new(PlantIdConfig::from_env()?)
    }

    pub fn config(&self) -> &PlantIdConfig {
        &self.config
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, GatewayError>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = ai_core::retry_after_from_headers(response.headers());

            let body_text = response.text().await.unwrap_or_default();
            // Prefer the structured error message when one is present.
            let detail = serde_json::from_str::<ApiError>(&body_text)
                .map(|e| e.error)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body_text);

            return Err(GatewayError::from_status(status, &detail, retry_after));
        }

        response.json::<R>().await.map_err(|e| {
            GatewayError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    fn map_suggestion(suggestion: Suggestion) -> SpeciesCandidate {
        let name = if suggestion.name.is_empty() {
            UNKNOWN.to_string()
        } else {
            suggestion.name
        };
        let family = if suggestion.details.taxonomy.family.is_empty() {
            UNKNOWN.to_string()
        } else {
            suggestion.details.taxonomy.family
        };
        let genus = if suggestion.details.taxonomy.genus.is_empty() {
            UNKNOWN.to_string()
        } else {
            suggestion.details.taxonomy.genus
        };

        let description = suggestion.details.description.value;

        SpeciesCandidate {
            scientific_name: name,
            common_names: suggestion.details.common_names,
            family,
            genus,
            confidence: suggestion.probability.clamp(0.0, 1.0),
            similar_image_url: suggestion
                .similar_images
                .into_iter()
                .map(|i| i.url)
                .find(|url| !url.is_empty()),
            provider_species_id: if suggestion.id.is_empty() {
                None
            } else {
                Some(suggestion.id)
            },
            description: if description.is_empty() {
                None
            } else {
                Some(description)
            },
            toxicity: suggestion.details.toxicity.filter(|t| !t.is_empty()),
        }
    }

    fn map_issue(suggestion: DiseaseSuggestion) -> RankedIssue {
        let details = suggestion.details;
        let mut treatments = Vec::new();
        treatments.extend(details.treatment.biological);
        treatments.extend(details.treatment.chemical);
        treatments.extend(details.treatment.prevention);

        let confidence = suggestion.probability.clamp(0.0, 1.0);
        let severity = if confidence >= 0.8 {
            "high"
        } else if confidence >= 0.5 {
            "moderate"
        } else {
            "low"
        };

        RankedIssue {
            name: if suggestion.name.is_empty() {
                UNKNOWN.to_string()
            } else {
                suggestion.name
            },
            description: details.description,
            confidence,
            severity: severity.to_string(),
            treatments,
        }
    }
}

#[async_trait]
impl IdentifyProvider for PlantIdGateway {
    async fn identify(&self, images: &[String]) -> Result<Identification, GatewayError> {
        let request = IdentificationRequest {
            images: images.to_vec(),
            similar_images: self.config.request_similar_images,
        };

        debug!(image_count = images.len(), "sending identification request");
        let response: IdentificationResponse =
            self.post_json("/api/v3/identification", &request).await?;

        let mut suggestions = response.result.classification.suggestions.into_iter();
        let top = match suggestions.next() {
            Some(s) => Self::map_suggestion(s),
            None => {
                warn!("identification response contained no suggestions");
                return Err(GatewayError::no_match(
                    "vendor returned an empty classification",
                ));
            }
        };

        let alternatives = suggestions
            .take(MAX_ALTERNATIVES)
            .map(Self::map_suggestion)
            .collect();

        Ok(Identification {
            is_plant: response.result.is_plant.binary,
            top,
            alternatives,
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        "plant-id-v3"
    }
}

#[async_trait]
impl HealthProvider for PlantIdGateway {
    async fn assess(
        &self,
        images: &[String],
        _symptoms: Option<&str>,
    ) -> Result<HealthAssessment, GatewayError> {
        let request = HealthRequest {
            images: images.to_vec(),
            similar_images: false,
        };

        debug!(image_count = images.len(), "sending health assessment request");
        let response: HealthResponse = self.post_json("/api/v3/health_assessment", &request).await?;

        let mut issues: Vec<RankedIssue> = response
            .result
            .disease
            .suggestions
            .into_iter()
            .map(Self::map_issue)
            .collect();
        issues.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(HealthAssessment {
            is_healthy: response.result.is_healthy.binary,
            issues,
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        "plant-id-health"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{SuggestionDetails, Taxonomy, Treatment};

    fn suggestion(name: &str, probability: f64) -> Suggestion {
        Suggestion {
            id: "sp-1".to_string(),
            name: name.to_string(),
            probability,
            similar_images: vec![],
            details: SuggestionDetails {
                common_names: vec!["Pothos".to_string()],
                taxonomy: Taxonomy {
                    family: "Araceae".to_string(),
                    genus: "Epipremnum".to_string(),
                },
                description: crate::api_types::DetailText {
                    value: "A hardy trailing vine.".to_string(),
                },
                toxicity: Some("toxic to cats and dogs".to_string()),
            },
        }
    }

    #[test]
    fn test_map_suggestion_full() {
        let candidate = PlantIdGateway::map_suggestion(suggestion("Epipremnum aureum", 0.93));
        assert_eq!(candidate.scientific_name, "Epipremnum aureum");
        assert_eq!(candidate.family, "Araceae");
        assert_eq!(candidate.genus, "Epipremnum");
        assert_eq!(candidate.confidence, 0.93);
        assert_eq!(candidate.provider_species_id.as_deref(), Some("sp-1"));
        assert_eq!(candidate.description.as_deref(), Some("A hardy trailing vine."));
        assert_eq!(candidate.toxicity.as_deref(), Some("toxic to cats and dogs"));
    }

    #[test]
    fn test_map_suggestion_defaults_missing_fields() {
        let candidate = PlantIdGateway::map_suggestion(Suggestion::default());
        assert_eq!(candidate.scientific_name, "Unknown");
        assert_eq!(candidate.family, "Unknown");
        assert_eq!(candidate.genus, "Unknown");
        assert_eq!(candidate.confidence, 0.0);
        assert!(candidate.common_names.is_empty());
        assert!(candidate.provider_species_id.is_none());
        assert!(candidate.similar_image_url.is_none());
    }

    #[test]
    fn test_map_suggestion_clamps_confidence() {
        let candidate = PlantIdGateway::map_suggestion(suggestion("x", 1.7));
        assert_eq!(candidate.confidence, 1.0);
    }

    #[test]
    fn test_map_issue_orders_treatments() {
        let issue = PlantIdGateway::map_issue(DiseaseSuggestion {
            name: "root rot".to_string(),
            probability: 0.82,
            details: crate::api_types::DiseaseDetails {
                description: "overwatering damage".to_string(),
                treatment: Treatment {
                    biological: vec!["repot in fresh soil".to_string()],
                    chemical: vec!["apply fungicide".to_string()],
                    prevention: vec!["water less often".to_string()],
                },
            },
        });

        assert_eq!(issue.severity, "high");
        assert_eq!(
            issue.treatments,
            vec![
                "repot in fresh soil".to_string(),
                "apply fungicide".to_string(),
                "water less often".to_string(),
            ]
        );
    }

    #[test]
    fn test_tolerant_response_parsing() {
        // A thin payload with most fields absent must still parse.
        let json = r#"{"result": {"classification": {"suggestions": [{"name": "Monstera deliciosa"}]}}}"#;
        let response: IdentificationResponse = serde_json::from_str(json).unwrap();
        let top = &response.result.classification.suggestions[0];
        assert_eq!(top.name, "Monstera deliciosa");
        assert_eq!(top.probability, 0.0);
        assert!(!response.result.is_plant.binary);
    }
}
