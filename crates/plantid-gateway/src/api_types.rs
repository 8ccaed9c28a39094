//! Plant.id API request and response types.
//!
//! Response shapes are parsed tolerantly: every field the vendor may omit
//! carries `#[serde(default)]` so a thin payload maps to explicit defaults
//! rather than a parse failure.

use serde::{Deserialize, Serialize};

/// Identification request body.
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationRequest {
    /// Bare base64 images, 1-5.
    pub images: Vec<String>,
    /// Request reference images alongside suggestions.
    pub similar_images: bool,
}

/// Health assessment request body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRequest {
    /// Bare base64 images, 1-3.
    pub images: Vec<String>,
    pub similar_images: bool,
}

/// Top-level identification response.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentificationResponse {
    #[serde(default)]
    pub result: IdentificationResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentificationResult {
    #[serde(default)]
    pub is_plant: BinarySignal,
    #[serde(default)]
    pub classification: Classification,
}

/// A probability plus the vendor's thresholded verdict.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinarySignal {
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub binary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// One species suggestion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub id: String,
    /// Scientific name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub similar_images: Vec<SimilarImage>,
    #[serde(default)]
    pub details: SuggestionDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimilarImage {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionDetails {
    #[serde(default)]
    pub common_names: Vec<String>,
    #[serde(default)]
    pub taxonomy: Taxonomy,
    #[serde(default)]
    pub description: DetailText,
    #[serde(default)]
    pub toxicity: Option<String>,
}

/// Free text wrapped in a `{"value": ...}` object by the vendor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailText {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub genus: String,
}

/// Top-level health assessment response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub result: HealthResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResult {
    #[serde(default)]
    pub is_healthy: BinarySignal,
    #[serde(default)]
    pub disease: Disease,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Disease {
    #[serde(default)]
    pub suggestions: Vec<DiseaseSuggestion>,
}

/// One diagnosed issue.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiseaseSuggestion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub details: DiseaseDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiseaseDetails {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub treatment: Treatment,
}

/// Treatment suggestions grouped by approach; flattened into ordered steps
/// when mapped (biological first, then chemical, then prevention).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Treatment {
    #[serde(default)]
    pub biological: Vec<String>,
    #[serde(default)]
    pub chemical: Vec<String>,
    #[serde(default)]
    pub prevention: Vec<String>,
}

/// Structured error body some endpoints return.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error: String,
}
