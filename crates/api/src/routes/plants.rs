//! `POST /api/v1/plants`

use axum::extract::{OriginalUri, State};
use axum::Json;
use orchestrator::NewPlantRequest;

use crate::auth::AuthUser;
use crate::envelope::success;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn create_plant(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<NewPlantRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let path = uri.path().to_string();

    let plant = state
        .plants
        .create(user.user_id, &body)
        .await
        .map_err(|e| ApiError::from(e).at(&path))?;

    Ok(success(&plant))
}
