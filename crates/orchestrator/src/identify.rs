//! The identification pipeline: validate, route and upload in parallel,
//! resolve the species, shape the response.

use std::sync::Arc;
use std::time::Instant;

use ai_core::{normalize_and_validate, AiTask, CancellationToken, SpeciesCandidate};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use database::{photo, Database, PhotoKind};
use serde::Serialize;
use storage::{make_thumbnail, photo_key, PhotoOwner, PhotoStorage, DEFAULT_URL_EXPIRY_SECS};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::limiter::RateLimiter;
use crate::router::AiRouter;
use crate::species::{normalize_scientific_name, SpeciesResolver};

/// Most images per identify call.
pub const MAX_IDENTIFY_IMAGES: usize = 5;

/// Below this top confidence the response carries alternatives.
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f64 = 0.70;

/// Most alternatives ever returned.
const MAX_SIMILAR_SPECIES: usize = 5;

/// Species block of the identify response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifiedSpecies {
    /// Catalog row id; null when resolution failed.
    pub id: Option<Uuid>,
    /// Normalized scientific name.
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub confidence: f64,
}

/// One lower-confidence alternative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarSpecies {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub confidence: f64,
    pub similar_image_url: Option<String>,
}

/// Uploaded photo URLs; empty strings when the upload failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUrls {
    pub url: String,
    pub thumbnail_url: String,
}

/// The shaped identify result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResponse {
    pub species: IdentifiedSpecies,
    /// Populated only when the top confidence is below the threshold.
    pub similar_species: Vec<SimilarSpecies>,
    pub photo: PhotoUrls,
    #[serde(skip)]
    pub provider: String,
    #[serde(skip)]
    pub processing_time_ms: u64,
}

/// The identification pipeline.
pub struct IdentificationPipeline {
    router: Arc<AiRouter>,
    resolver: SpeciesResolver,
    storage: Arc<dyn PhotoStorage>,
    db: Database,
    limiter: Arc<RateLimiter>,
    low_confidence_threshold: f64,
}

impl IdentificationPipeline {
    pub fn new(
        router: Arc<AiRouter>,
        db: Database,
        storage: Arc<dyn PhotoStorage>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            router,
            resolver: SpeciesResolver::new(db.clone()),
            storage,
            db,
            limiter,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    /// Run the pipeline for already-authenticated input.
    pub async fn run(
        &self,
        user_id: Uuid,
        images: &[String],
        cancel: &CancellationToken,
    ) -> Result<IdentifyResponse, OrchestratorError> {
        let started = Instant::now();

        if images.is_empty() || images.len() > MAX_IDENTIFY_IMAGES {
            return Err(OrchestratorError::InvalidInput(format!(
                "expected 1 to {} images, got {}",
                MAX_IDENTIFY_IMAGES,
                images.len()
            )));
        }
        let normalized = normalize_and_validate(images)?;

        self.limiter.check_window(user_id, "/api/v1/identify")?;
        self.limiter.check_quota(user_id, AiTask::Identification).await?;

        // Routing and upload overlap; the response needs both.
        let (routed, stored) = tokio::join!(
            self.router.identify(user_id, &normalized, cancel),
            self.upload_first_image(user_id, &normalized[0]),
        );
        let routed = routed?;

        let photo_urls = match stored {
            Some(stored) => {
                // The reference row is best-effort, like the upload itself.
                if let Err(e) = photo::insert_photo(
                    self.db.pool(),
                    user_id,
                    None,
                    &stored.url,
                    stored.thumbnail_url.as_deref(),
                    PhotoKind::Identification,
                )
                .await
                {
                    warn!(error = %e, "photo reference insert failed");
                }
                PhotoUrls {
                    url: stored.url,
                    thumbnail_url: stored.thumbnail_url.unwrap_or_default(),
                }
            }
            None => PhotoUrls {
                url: String::new(),
                thumbnail_url: String::new(),
            },
        };

        // Species resolution is non-fatal: identification stays responsive
        // even when the catalog write path is down.
        let species_id = match self.resolver.resolve(&routed.value.top).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "species resolution failed, returning null id");
                None
            }
        };

        let top = &routed.value.top;
        let similar_species = if top.confidence < self.low_confidence_threshold {
            routed
                .value
                .alternatives
                .iter()
                .take(MAX_SIMILAR_SPECIES)
                .map(|alt| SimilarSpecies {
                    scientific_name: normalize_scientific_name(&alt.scientific_name),
                    common_names: alt.common_names.clone(),
                    confidence: alt.confidence,
                    similar_image_url: alt.similar_image_url.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        info!(
            provider = %routed.provider,
            confidence = top.confidence,
            species_resolved = species_id.is_some(),
            "identification complete"
        );

        Ok(IdentifyResponse {
            species: shaped_species(top, species_id),
            similar_species,
            photo: photo_urls,
            provider: routed.provider,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Upload the first image with its thumbnail. Failures come back as
    /// `None`; identification proceeds without URLs.
    async fn upload_first_image(
        &self,
        user_id: Uuid,
        image_b64: &str,
    ) -> Option<storage::StoredPhoto> {
        let bytes = match BASE64.decode(image_b64) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "image payload was not decodable, skipping upload");
                return None;
            }
        };

        let thumbnail = match make_thumbnail(&bytes) {
            Ok(thumb) => Some(thumb),
            Err(e) => {
                warn!(error = %e, "thumbnail generation failed, uploading original only");
                None
            }
        };

        let timestamp_ms = Utc::now().timestamp_millis();
        let key = photo_key(
            &user_id.to_string(),
            &PhotoOwner::Temp(timestamp_ms),
            "identification",
            timestamp_ms,
        );

        match self
            .storage
            .put_photo(&key, bytes, thumbnail, DEFAULT_URL_EXPIRY_SECS)
            .await
        {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(error = %e, "photo upload failed, continuing without URLs");
                None
            }
        }
    }
}

fn shaped_species(top: &SpeciesCandidate, species_id: Option<Uuid>) -> IdentifiedSpecies {
    IdentifiedSpecies {
        id: species_id,
        scientific_name: normalize_scientific_name(&top.scientific_name),
        common_names: top.common_names.clone(),
        family: top.family.clone(),
        confidence: top.confidence,
    }
}
