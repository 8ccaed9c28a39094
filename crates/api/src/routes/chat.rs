//! `POST /api/v1/chat` and `POST /api/v1/chat/stream`

use std::convert::Infallible;

use ai_core::CancellationToken;
use axum::extract::{OriginalUri, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use orchestrator::chat::ChatStreamItem;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::envelope::success;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub session_id: Option<Uuid>,
    pub message: String,
    pub plant_id: Option<Uuid>,
}

pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ChatRequestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let path = uri.path().to_string();
    let cancel = CancellationToken::new();

    let result = tokio::time::timeout(
        state.config.chat_timeout,
        state.chat.run(
            user.user_id,
            &body.message,
            body.plant_id,
            body.session_id,
            &cancel,
        ),
    )
    .await;

    let outcome = match result {
        Ok(result) => result.map_err(|e| ApiError::from(e).at(&path))?,
        Err(_) => {
            cancel.cancel();
            return Err(ApiError::from(orchestrator::OrchestratorError::Cancelled).at(&path));
        }
    };

    Ok(success(&outcome))
}

/// Server-sent events: `start`, `chunk`, `done`, `error`.
pub async fn chat_stream(
    State(state): State<AppState>,
    user: AuthUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<ChatRequestBody>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let path = uri.path().to_string();
    let cancel = CancellationToken::new();

    // The stream-level deadline cancels the pipeline; chunks already
    // emitted are not retracted.
    let deadline = state.config.chat_stream_timeout;
    let deadline_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        deadline_cancel.cancel();
    });

    let rx = state
        .chat
        .clone()
        .run_stream(
            user.user_id,
            body.message,
            body.plant_id,
            body.session_id,
            cancel,
        )
        .await
        .map_err(|e| ApiError::from(e).at(&path))?;

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        Some((Ok(to_sse_event(item)), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(item: ChatStreamItem) -> Event {
    match item {
        ChatStreamItem::Start { session_id } => Event::default()
            .event("start")
            .data(json!({ "sessionId": session_id }).to_string()),
        ChatStreamItem::Chunk(text) => Event::default()
            .event("chunk")
            .data(json!({ "delta": text }).to_string()),
        ChatStreamItem::Done(outcome) => Event::default()
            .event("done")
            .data(json!({ "success": true, "data": *outcome }).to_string()),
        ChatStreamItem::Error(message) => Event::default()
            .event("error")
            .data(json!({ "success": false, "message": message }).to_string()),
    }
}
