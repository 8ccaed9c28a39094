//! Application state shared across handlers.

use std::sync::Arc;

use orchestrator::{ChatPipeline, HealthPipeline, IdentificationPipeline, PlantService};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Identification pipeline.
    pub identify: Arc<IdentificationPipeline>,
    /// Health assessment pipeline.
    pub assess: Arc<HealthPipeline>,
    /// Chat pipeline.
    pub chat: Arc<ChatPipeline>,
    /// Plant creation service.
    pub plants: Arc<PlantService>,
    /// Database handle for readiness checks.
    pub db: database::Database,
    /// Bearer token verification secret.
    pub jwt_secret: String,
    /// Request-level timeouts.
    pub config: Arc<AppConfig>,
}
