//! `POST /api/v1/health/assess`

use ai_core::CancellationToken;
use axum::extract::{OriginalUri, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::envelope::success_with_meta;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessRequest {
    pub plant_id: Uuid,
    /// 1-3 base64 images.
    pub images: Vec<String>,
    pub symptoms_description: Option<String>,
}

pub async fn assess(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<AssessRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let path = uri.path().to_string();
    let cancel = CancellationToken::new();

    let result = tokio::time::timeout(
        state.config.assess_timeout,
        state.assess.run(
            user.user_id,
            body.plant_id,
            &body.images,
            body.symptoms_description.as_deref(),
            &cancel,
        ),
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
