//! The health assessment pipeline: validate, route, persist diagnoses.

use std::sync::Arc;
use std::time::Instant;

use ai_core::{normalize_and_validate, AiTask, CancellationToken};
use database::{health, plant, Database};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::limiter::RateLimiter;
use crate::router::AiRouter;

/// Most images per assessment call.
pub const MAX_ASSESS_IMAGES: usize = 3;

/// One diagnosed issue in the response, with its persisted id and ordered
/// treatment steps.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessedIssue {
    /// Persisted row id; null when persistence failed.
    pub id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub confidence: f64,
    pub severity: String,
    pub treatment_steps: Vec<String>,
}

/// The shaped assessment result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessResponse {
    pub plant_id: Uuid,
    pub is_healthy: bool,
    /// Ranked by confidence, highest first.
    pub issues: Vec<AssessedIssue>,
    #[serde(skip)]
    pub provider: String,
    #[serde(skip)]
    pub processing_time_ms: u64,
}

/// The health assessment pipeline.
pub struct HealthPipeline {
    router: Arc<AiRouter>,
    db: Database,
    limiter: Arc<RateLimiter>,
}

impl HealthPipeline {
    pub fn new(router: Arc<AiRouter>, db: Database, limiter: Arc<RateLimiter>) -> Self {
        Self { router, db, limiter }
    }

    /// Run the pipeline for already-authenticated input.
    pub async fn run(
        &self,
        user_id: Uuid,
        plant_id: Uuid,
        images: &[String],
        symptoms: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AssessResponse, OrchestratorError> {
        let started = Instant::now();

        if images.is_empty() || images.len() > MAX_ASSESS_IMAGES {
            return Err(OrchestratorError::InvalidInput(format!(
                "expected 1 to {} images, got {}",
                MAX_ASSESS_IMAGES,
                images.len()
            )));
        }
        let normalized = normalize_and_validate(images)?;

        self.limiter.check_window(user_id, "/api/v1/health/assess")?;
        self.limiter
            .check_quota(user_id, AiTask::HealthAssessment)
            .await?;

        // Ownership gate before any provider spend.
        let plant = plant::get_plant(self.db.pool(), user_id, plant_id)
            .await
            .map_err(|e| OrchestratorError::from_lookup(e, "Plant"))?;

        let routed = self
            .router
            .assess_health(user_id, &normalized, symptoms, cancel)
            .await?;

        let mut issues = Vec::with_capacity(routed.value.issues.len());
        for ranked in &routed.value.issues {
            // Diagnosis persistence is best-effort; the assessment is
            // still useful without a stored row.
            let id = match health::create_issue(
                self.db.pool(),
                &health::NewHealthIssue {
                    plant_id: plant.id,
                    name: ranked.name.clone(),
                    description: ranked.description.clone(),
                    confidence: ranked.confidence,
                    severity: ranked.severity.clone(),
                    treatments: ranked.treatments.clone(),
                },
            )
            .await
            {
                Ok(issue) => Some(issue.id),
                Err(e) => {
                    warn!(error = %e, issue = %ranked.name, "issue persistence failed");
                    None
                }
            };

            issues.push(AssessedIssue {
                id,
                name: ranked.name.clone(),
                description: ranked.description.clone(),
                confidence: ranked.confidence,
                severity: ranked.severity.clone(),
                treatment_steps: ranked.treatments.clone(),
            });
        }

        info!(
            plant = %plant.id,
            provider = %routed.provider,
            issues = issues.len(),
            "health assessment complete"
        );

        Ok(AssessResponse {
            plant_id: plant.id,
            is_healthy: routed.value.is_healthy,
            issues,
            provider: routed.provider,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_serializes_camel_case() {
        let response = AssessResponse {
            plant_id: Uuid::new_v4(),
            is_healthy: false,
            issues: vec![AssessedIssue {
                id: None,
                name: "root rot".to_string(),
                description: "soggy base".to_string(),
                confidence: 0.8,
                severity: "high".to_string(),
                treatment_steps: vec!["repot".to_string()],
            }],
            provider: "plant-id".to_string(),
            processing_time_ms: 5,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isHealthy"], false);
        assert!(json["issues"][0]["treatmentSteps"].is_array());
        assert!(json.get("provider").is_none());
    }
}
