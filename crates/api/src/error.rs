//! Error envelope and HTTP mapping.
//!
//! Every error response is JSON with the shared envelope:
//! `{"success": false, "error": {code, message, details?, timestamp, path}}`.
//! Messages never leak API keys, stack traces, or vendor identifiers
//! beyond the attempted-provider list on 503s.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use orchestrator::OrchestratorError;
use serde_json::json;

/// An API error ready to render.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub retry_after_secs: Option<u64>,
    pub path: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            retry_after_secs: None,
            path: String::new(),
        }
    }

    /// Record the request path for the envelope.
    pub fn at(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "something went wrong",
        )
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidInput(message) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
            }
            OrchestratorError::Image(image_err) => {
                let (status, code) = match image_err {
                    ai_core::ImageError::TooLarge { .. } => {
                        (StatusCode::BAD_REQUEST, "IMAGE_TOO_LARGE")
                    }
                    ai_core::ImageError::Empty { .. } => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
                    }
                };
                Self {
                    details: Some(json!({ "index": offending_index(&image_err) })),
                    ..Self::new(status, code, image_err.to_string())
                }
            }
            OrchestratorError::RateLimited { retry_after_secs } => Self {
                retry_after_secs: Some(retry_after_secs),
                ..Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMIT_EXCEEDED",
                    "too many requests, slow down",
                )
            },
            OrchestratorError::QuotaExceeded {
                feature,
                used,
                limit,
                resets_at,
            } => Self {
                details: Some(json!({
                    "feature": feature,
                    "used": used,
                    "limit": limit,
                    "resetsAt": resets_at.to_rfc3339(),
                })),
                ..Self::new(
                    StatusCode::PAYMENT_REQUIRED,
                    "LIMIT_EXCEEDED",
                    format!("monthly {} limit reached", feature),
                )
            },
            OrchestratorError::Router(router_err) => Self {
                details: Some(json!({ "attemptedProviders": router_err.attempted })),
                ..Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "AI_UNAVAILABLE",
                    "AI providers are currently unavailable",
                )
            },
            OrchestratorError::NotFound { entity } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", entity),
            ),
            OrchestratorError::Database(db_err) => {
                tracing::error!(error = %db_err, "database error");
                Self::internal()
            }
            OrchestratorError::Cancelled => Self::new(
                StatusCode::REQUEST_TIMEOUT,
                "REQUEST_TIMEOUT",
                "the request was cancelled",
            ),
        }
    }
}

fn offending_index(err: &ai_core::ImageError) -> usize {
    match err {
        ai_core::ImageError::TooLarge { index, .. } => *index,
        ai_core::ImageError::Empty { index } => *index,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
            "timestamp": Utc::now().to_rfc3339(),
            "path": self.path,
        });
        if let Some(details) = self.details {
            error["details"] = details;
        }

        let body = json!({ "success": false, "error": error });
        let mut response = (self.status, Json(body)).into_response();

        if let Some(retry_after) = self.retry_after_secs {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ai_core::GatewayError;
    use orchestrator::RouterError;

    #[test]
    fn test_router_exhaustion_maps_to_503_with_providers() {
        let err = OrchestratorError::Router(RouterError {
            task: ai_core::AiTask::Identification,
            attempted: vec!["plant-id".to_string(), "gemini".to_string()],
            last: GatewayError::service("503"),
        });
        let api_err = ApiError::from(err);

        assert_eq!(api_err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_err.code, "AI_UNAVAILABLE");
        let details = api_err.details.unwrap();
        assert_eq!(details["attemptedProviders"][0], "plant-id");
        assert_eq!(details["attemptedProviders"][1], "gemini");
    }

    #[test]
    fn test_quota_maps_to_402_with_details() {
        let err = OrchestratorError::QuotaExceeded {
            feature: "chat",
            used: 10,
            limit: 10,
            resets_at: Utc::now(),
        };
        let api_err = ApiError::from(err);

        assert_eq!(api_err.status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(api_err.code, "LIMIT_EXCEEDED");
        let details = api_err.details.unwrap();
        assert_eq!(details["used"], 10);
        assert_eq!(details["limit"], 10);
    }

    #[test]
    fn test_rate_limit_maps_to_429() {
        let api_err = ApiError::from(OrchestratorError::RateLimited { retry_after_secs: 7 });
        assert_eq!(api_err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api_err.retry_after_secs, Some(7));
    }

    #[test]
    fn test_oversized_image_maps_to_400_with_index() {
        let err = OrchestratorError::Image(ai_core::ImageError::TooLarge {
            index: 2,
            estimated: 11_000_000,
            max_bytes: 10_485_760,
        });
        let api_err = ApiError::from(err);
        assert_eq!(api_err.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_err.code, "IMAGE_TOO_LARGE");
        assert_eq!(api_err.details.unwrap()["index"], 2);
    }

    #[test]
    fn test_database_errors_hide_detail() {
        let err = OrchestratorError::Database(database::DatabaseError::NotFound {
            entity: "Species",
            id: "x".to_string(),
        });
        let api_err = ApiError::from(err);
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.message, "something went wrong");
    }
}
