//! Route wiring.

mod assess;
mod chat;
mod health;
mod identify;
mod plants;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/identify", post(identify::identify))
        .route("/health/assess", post(assess::assess))
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/plants", post(plants::create_plant));

    Router::new()
        .nest("/api/v1", api_v1)
        // Liveness endpoints are never auth-gated.
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .with_state(state)
}
