//! `POST /api/v1/identify`

use ai_core::CancellationToken;
use axum::extract::{OriginalUri, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::envelope::success_with_meta;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    /// 1-5 base64 images, with or without a `data:` prefix.
    pub images: Vec<String>,
}

pub async fn identify(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<IdentifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let path = uri.path().to_string();
    let cancel = CancellationToken::new();

    // Request-level deadline; the pipeline observes the token between
    // suspension points.
    let result = tokio::time::timeout(
        state.config.identify_timeout,
        state.identify.run(user.user_id, &body.images, &cancel),
    )
    .await;

    let response = match result {
        Ok(result) => result.map_err(|e| ApiError::from(e).at(&path))?,
        Err(_) => {
            cancel.cancel();
            return Err(ApiError::from(orchestrator::OrchestratorError::Cancelled).at(&path));
        }
    };

    let meta = json!({
        "provider": response.provider.clone(),
        "processingTimeMs": response.processing_time_ms,
    });
    Ok(success_with_meta(&response, meta))
}
