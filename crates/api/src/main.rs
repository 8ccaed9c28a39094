//! Verdant API server.
//!
//! Wires the vendor gateways into the router chains, builds the
//! pipelines, and serves the HTTP surface.

mod auth;
mod config;
mod envelope;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use ai_core::{AiTask, ModelTier};
use claude_gateway::ClaudeGateway;
use database::Database;
use gemini_gateway::GeminiGateway;
use openai_gateway::OpenAiGateway;
use orchestrator::{
    AiRouter, ChatPipeline, ContextAssembler, HealthPipeline, IdentificationPipeline,
    PlantService, QuotaConfig, RateLimiter, RouterConfig,
};
use orchestrator::router::LedgerSink;
use plantid_gateway::PlantIdGateway;
use storage::{S3Config, S3PhotoStorage};
use tracing::info;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env().expect("configuration error");

    let db = Database::connect(&config.database_url, config.database_pool_size)
        .await
        .expect("database connection failed");
    db.migrate().await.expect("migrations failed");

    let plantid = Arc::new(PlantIdGateway::from_env().expect("plant-id gateway"));
    let gemini = Arc::new(GeminiGateway::from_env().expect("gemini gateway"));
    let claude = Arc::new(ClaudeGateway::from_env().expect("claude gateway"));
    let openai = Arc::new(OpenAiGateway::from_env().expect("openai gateway"));

    let identify_timeout = plantid.config().timeout;
    let vision_timeout = gemini.config().timeout;
    let chat_simple_timeout = claude.config().timeout_simple;
    let chat_complex_timeout = claude.config().timeout_complex;
    let fallback_chat_timeout = openai.config().chat_timeout;
    let embed_timeout = openai.config().embedding_timeout;

    // The chains mirror the degradation order: same-vendor tier drop
    // before a vendor switch, and no embedding fallback at all.
    let router = Arc::new(
        AiRouter::new(
            RouterConfig::default(),
            Arc::new(LedgerSink::new(db.clone())),
        )
        .with_identify_route("plant-id", identify_timeout, plantid.clone())
        .with_identify_route("gemini", vision_timeout, gemini.clone())
        .with_health_route("plant-id", identify_timeout, plantid.clone())
        .with_health_route("claude", chat_simple_timeout, claude.clone())
        .with_chat_route(
            AiTask::ChatSimple,
            "claude",
            chat_simple_timeout,
            ModelTier::Simple,
            claude.clone(),
        )
        .with_chat_route(
            AiTask::ChatSimple,
            "openai",
            fallback_chat_timeout,
            ModelTier::Simple,
            openai.clone(),
        )
        .with_chat_route(
            AiTask::ChatComplex,
            "claude",
            chat_complex_timeout,
            ModelTier::Complex,
            claude.clone(),
        )
        .with_chat_route(
            AiTask::ChatComplex,
            "claude",
            chat_simple_timeout,
            ModelTier::Simple,
            claude.clone(),
        )
        .with_chat_route(
            AiTask::ChatComplex,
            "openai",
            fallback_chat_timeout,
            ModelTier::Simple,
            openai.clone(),
        )
        .with_embed_route("openai", embed_timeout, openai),
    );

    let photo_storage = Arc::new(
        S3PhotoStorage::from_env(S3Config::from_env().expect("storage config")).await,
    );

    let limiter = Arc::new(RateLimiter::new(db.clone(), QuotaConfig::from_env()));

    let semantic_threshold = env_f64("VERDANT_SEMANTIC_THRESHOLD", 0.70);
    let low_confidence_threshold = env_f64("VERDANT_LOW_CONFIDENCE_THRESHOLD", 0.70);
    let assembler = Arc::new(
        ContextAssembler::new(db.clone())
            .with_budget(orchestrator::TokenBudget::from_env())
            .with_semantic_threshold(semantic_threshold),
    );

    let state = AppState {
        identify: Arc::new(
            IdentificationPipeline::new(
                router.clone(),
                db.clone(),
                photo_storage,
                limiter.clone(),
            )
            .with_low_confidence_threshold(low_confidence_threshold),
        ),
        assess: Arc::new(HealthPipeline::new(router.clone(), db.clone(), limiter.clone())),
        chat: Arc::new(ChatPipeline::new(router, assembler, db.clone(), limiter)),
        plants: Arc::new(PlantService::new(db.clone())),
        db,
        jwt_secret: config.jwt_secret.clone(),
        config: Arc::new(config),
    };

    let app = routes::router(state.clone());

    let addr: SocketAddr = state.config.addr.parse().expect("invalid VERDANT_API_ADDR");
    info!(%addr, "Verdant API listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn env_f64(key: &str, fallback: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}
