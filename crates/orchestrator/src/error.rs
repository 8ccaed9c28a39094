//! Error types for orchestrator operations.

use ai_core::ImageError;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::router::RouterError;

/// Errors that can occur during pipeline execution.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Input failed validation before any provider call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An image failed size or shape validation.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Every provider in the chain failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A sliding-window cap was hit.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The tier's monthly quota for a feature is spent.
    #[error("{feature} quota exhausted: {used}/{limit}")]
    QuotaExceeded {
        feature: &'static str,
        used: i64,
        limit: i64,
        resets_at: DateTime<Utc>,
    },

    /// Repository failure that the pipeline cannot degrade around.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),

    /// The request referenced a resource the user does not own.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Collapse ownership lookups into `NotFound` and keep everything else.
    pub(crate) fn from_lookup(err: database::DatabaseError, entity: &'static str) -> Self {
        match err {
            database::DatabaseError::NotFound { .. } => OrchestratorError::NotFound { entity },
            other => OrchestratorError::Database(other),
        }
    }
}
