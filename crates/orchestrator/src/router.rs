//! The AI router: ordered fallback chains per semantic task.
//!
//! For each task the router holds an ordered list of named providers. A
//! call walks the chain: each provider runs under the retry harness, every
//! provider's terminal outcome writes exactly one usage ledger row, and
//! the first success returns annotated with its provider name and whether
//! it was a fallback. A chain with no survivor yields [`RouterError`]
//! carrying the ordered attempt list - never a partial result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ai_core::{
    run_with_retry, AiTask, CancellationToken, ChatProvider, ChatRequest, ChatStream,
    EmbedProvider, Embedding, GatewayError, HealthAssessment, HealthProvider, Identification,
    IdentifyProvider, ModelTier, RetryPolicy, TokenUsage,
};
use async_trait::async_trait;
use database::{usage, Database, NewUsageLogEntry};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cost::cost_usd;

/// All providers in a chain failed.
#[derive(Debug, Error)]
#[error("all providers exhausted for {task} (attempted: {})", attempted.join(", "))]
pub struct RouterError {
    pub task: AiTask,
    /// Provider names in attempt order.
    pub attempted: Vec<String>,
    /// The failure from the last provider tried.
    pub last: GatewayError,
}

/// A routed result annotated with its provenance.
#[derive(Debug, Clone)]
pub struct Routed<T> {
    pub value: T,
    pub provider: String,
    pub model: String,
    /// True iff the serving provider was not first in the chain.
    pub is_fallback: bool,
}

/// Retry budget shared by every chain.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Attempts per provider, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RouterConfig {
    fn policy(&self, attempt_timeout: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            attempt_timeout,
        }
    }
}

/// Where terminal provider outcomes are recorded.
///
/// Production wires [`LedgerSink`]; router tests use an in-memory sink.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, entry: NewUsageLogEntry);
}

/// Writes usage rows to the database. Failures are logged and swallowed:
/// accounting must never mask a router result.
pub struct LedgerSink {
    db: Database,
}

impl LedgerSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageSink for LedgerSink {
    async fn record(&self, entry: NewUsageLogEntry) {
        if let Err(e) = usage::insert_entry(self.db.pool(), &entry).await {
            warn!(error = %e, provider = %entry.provider, "usage ledger write failed");
        }
    }
}

struct IdentifyRoute {
    name: String,
    timeout: Duration,
    provider: Arc<dyn IdentifyProvider>,
}

struct HealthRoute {
    name: String,
    timeout: Duration,
    provider: Arc<dyn HealthProvider>,
}

struct ChatRoute {
    name: String,
    timeout: Duration,
    /// Tier this chain position runs at; lets the complex chain degrade
    /// to the simple model before switching vendors.
    tier: ModelTier,
    provider: Arc<dyn ChatProvider>,
}

struct EmbedRoute {
    name: String,
    timeout: Duration,
    provider: Arc<dyn EmbedProvider>,
}

/// Central router over the provider gateways.
pub struct AiRouter {
    config: RouterConfig,
    sink: Arc<dyn UsageSink>,
    identification: Vec<IdentifyRoute>,
    health: Vec<HealthRoute>,
    chat_simple: Vec<ChatRoute>,
    chat_complex: Vec<ChatRoute>,
    embedding: Vec<EmbedRoute>,
}

impl AiRouter {
    pub fn new(config: RouterConfig, sink: Arc<dyn UsageSink>) -> Self {
        Self {
            config,
            sink,
            identification: Vec::new(),
            health: Vec::new(),
            chat_simple: Vec::new(),
            chat_complex: Vec::new(),
            embedding: Vec::new(),
        }
    }

    /// Append a provider to the identification chain.
    pub fn with_identify_route(
        mut self,
        name: impl Into<String>,
        timeout: Duration,
        provider: Arc<dyn IdentifyProvider>,
    ) -> Self {
        self.identification.push(IdentifyRoute {
            name: name.into(),
            timeout,
            provider,
        });
        self
    }

    /// Append a provider to the health assessment chain.
    pub fn with_health_route(
        mut self,
        name: impl Into<String>,
        timeout: Duration,
        provider: Arc<dyn HealthProvider>,
    ) -> Self {
        self.health.push(HealthRoute {
            name: name.into(),
            timeout,
            provider,
        });
        self
    }

    /// Append a provider to one of the chat chains.
    pub fn with_chat_route(
        mut self,
        task: AiTask,
        name: impl Into<String>,
        timeout: Duration,
        tier: ModelTier,
        provider: Arc<dyn ChatProvider>,
    ) -> Self {
        let route = ChatRoute {
            name: name.into(),
            timeout,
            tier,
            provider,
        };
        match task {
            AiTask::ChatSimple => self.chat_simple.push(route),
            AiTask::ChatComplex => self.chat_complex.push(route),
            _ => panic!("with_chat_route takes a chat task"),
        }
        self
    }

    /// Append a provider to the embedding chain.
    pub fn with_embed_route(
        mut self,
        name: impl Into<String>,
        timeout: Duration,
        provider: Arc<dyn EmbedProvider>,
    ) -> Self {
        self.embedding.push(EmbedRoute {
            name: name.into(),
            timeout,
            provider,
        });
        self
    }

    /// Canonical endpoint label for ledger rows.
    fn endpoint_for(task: AiTask) -> &'static str {
        match task {
            AiTask::Identification => "/api/v1/identify",
            AiTask::HealthAssessment => "/api/v1/health/assess",
            AiTask::ChatSimple | AiTask::ChatComplex => "/api/v1/chat",
            AiTask::Embedding => "internal/embedding",
        }
    }

    /// Write one ledger row for a terminal provider outcome.
    pub async fn record(
        &self,
        user_id: Uuid,
        task: AiTask,
        provider: &str,
        model: &str,
        usage: Option<TokenUsage>,
        latency: Duration,
        error: Option<&GatewayError>,
    ) {
        let entry = NewUsageLogEntry {
            user_id,
            action: task.as_str().to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens: usage.map(|u| u.input_tokens as i32),
            output_tokens: usage.map(|u| u.output_tokens as i32),
            latency_ms: latency.as_millis() as i64,
            success: error.is_none(),
            error_code: error.map(|e| e.code().to_string()),
            cost_usd: if error.is_none() {
                cost_usd(provider, model, usage)
            } else {
                0.0
            },
            endpoint: Self::endpoint_for(task).to_string(),
        };
        self.sink.record(entry).await;
    }

    /// Run the identification chain.
    pub async fn identify(
        &self,
        user_id: Uuid,
        images: &[String],
        cancel: &CancellationToken,
    ) -> Result<Routed<Identification>, RouterError> {
        let mut attempted = Vec::new();
        let mut last_err: Option<GatewayError> = None;

        for (index, route) in self.identification.iter().enumerate() {
            attempted.push(route.name.clone());
            let policy = self.config.policy(route.timeout);
            let started = Instant::now();

            let result = run_with_retry(&policy, cancel, |attempt| {
                debug!(provider = %route.name, attempt, "identification attempt");
                route.provider.identify(images)
            })
            .await;
            let latency = started.elapsed();
            let model = route.provider.model().to_string();

            match result {
                Ok(value) => {
                    self.record(
                        user_id,
                        AiTask::Identification,
                        &route.name,
                        &model,
                        None,
                        latency,
                        None,
                    )
                    .await;
                    info!(provider = %route.name, fallback = index > 0, "identification succeeded");
                    return Ok(Routed {
                        value,
                        provider: route.name.clone(),
                        model,
                        is_fallback: index > 0,
                    });
                }
                Err(err) => {
                    self.record(
                        user_id,
                        AiTask::Identification,
                        &route.name,
                        &model,
                        None,
                        latency,
                        Some(&err),
                    )
                    .await;
                    warn!(provider = %route.name, error = %err, "identification provider failed");
                    last_err = Some(err);
                }
            }
        }

        Err(self.exhausted(AiTask::Identification, attempted, last_err))
    }

    /// Run the health assessment chain.
    pub async fn assess_health(
        &self,
        user_id: Uuid,
        images: &[String],
        symptoms: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Routed<HealthAssessment>, RouterError> {
        let mut attempted = Vec::new();
        let mut last_err: Option<GatewayError> = None;

        for (index, route) in self.health.iter().enumerate() {
            attempted.push(route.name.clone());
            let policy = self.config.policy(route.timeout);
            let started = Instant::now();

            let result = run_with_retry(&policy, cancel, |attempt| {
                debug!(provider = %route.name, attempt, "health assessment attempt");
                route.provider.assess(images, symptoms)
            })
            .await;
            let latency = started.elapsed();
            let model = route.provider.model().to_string();

            match result {
                Ok(value) => {
                    self.record(
                        user_id,
                        AiTask::HealthAssessment,
                        &route.name,
                        &model,
                        None,
                        latency,
                        None,
                    )
                    .await;
                    return Ok(Routed {
                        value,
                        provider: route.name.clone(),
                        model,
                        is_fallback: index > 0,
                    });
                }
                Err(err) => {
                    self.record(
                        user_id,
                        AiTask::HealthAssessment,
                        &route.name,
                        &model,
                        None,
                        latency,
                        Some(&err),
                    )
                    .await;
                    warn!(provider = %route.name, error = %err, "health provider failed");
                    last_err = Some(err);
                }
            }
        }

        Err(self.exhausted(AiTask::HealthAssessment, attempted, last_err))
    }

    /// Run the chat chain for the request's tier.
    pub async fn chat(
        &self,
        user_id: Uuid,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Routed<ai_core::ChatCompletion>, RouterError> {
        let task = request.tier.chat_task();
        let routes = self.chat_routes(task);

        let mut attempted = Vec::new();
        let mut last_err: Option<GatewayError> = None;

        for (index, route) in routes.iter().enumerate() {
            attempted.push(route.name.clone());
            let policy = self.config.policy(route.timeout);
            let started = Instant::now();

            // The chain position dictates the tier, so the complex chain
            // can degrade to the simple model before switching vendors.
            let mut positioned = request.clone();
            positioned.tier = route.tier;

            let result = run_with_retry(&policy, cancel, |attempt| {
                debug!(provider = %route.name, attempt, tier = route.tier.as_str(), "chat attempt");
                route.provider.chat(&positioned)
            })
            .await;
            let latency = started.elapsed();
            let model = route.provider.model(route.tier).to_string();

            match result {
                Ok(value) => {
                    self.record(user_id, task, &route.name, &model, Some(value.usage), latency, None)
                        .await;
                    return Ok(Routed {
                        value,
                        provider: route.name.clone(),
                        model,
                        is_fallback: index > 0,
                    });
                }
                Err(err) => {
                    self.record(user_id, task, &route.name, &model, None, latency, Some(&err))
                        .await;
                    warn!(provider = %route.name, error = %err, "chat provider failed");
                    last_err = Some(err);
                }
            }
        }

        Err(self.exhausted(task, attempted, last_err))
    }

    /// Open a chat stream from the first provider that accepts.
    ///
    /// The returned stream's terminal usage is not yet accounted: drive it
    /// to completion and call [`AiRouter::record`] with the final tuple
    /// (the chat pipeline does this on `Done` or mid-stream failure).
    pub async fn chat_stream(
        &self,
        user_id: Uuid,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Routed<ChatStream>, RouterError> {
        let task = request.tier.chat_task();
        let routes = self.chat_routes(task);

        let mut attempted = Vec::new();
        let mut last_err: Option<GatewayError> = None;

        for (index, route) in routes.iter().enumerate() {
            attempted.push(route.name.clone());
            let policy = self.config.policy(route.timeout);
            let started = Instant::now();

            let mut positioned = request.clone();
            positioned.tier = route.tier;

            let result = run_with_retry(&policy, cancel, |attempt| {
                debug!(provider = %route.name, attempt, "chat stream open attempt");
                route.provider.chat_stream(&positioned)
            })
            .await;
            let model = route.provider.model(route.tier).to_string();

            match result {
                Ok(stream) => {
                    return Ok(Routed {
                        value: stream,
                        provider: route.name.clone(),
                        model,
                        is_fallback: index > 0,
                    });
                }
                Err(err) => {
                    self.record(
                        user_id,
                        task,
                        &route.name,
                        &model,
                        None,
                        started.elapsed(),
                        Some(&err),
                    )
                    .await;
                    warn!(provider = %route.name, error = %err, "chat stream open failed");
                    last_err = Some(err);
                }
            }
        }

        Err(self.exhausted(task, attempted, last_err))
    }

    /// Run the embedding chain. There is no cross-vendor fallback; the
    /// chain has one entry, but the loop keeps the accounting uniform.
    pub async fn embed(
        &self,
        user_id: Uuid,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Routed<Embedding>, RouterError> {
        let mut attempted = Vec::new();
        let mut last_err: Option<GatewayError> = None;

        for (index, route) in self.embedding.iter().enumerate() {
            attempted.push(route.name.clone());
            let policy = self.config.policy(route.timeout);
            let started = Instant::now();

            let result = run_with_retry(&policy, cancel, |attempt| {
                debug!(provider = %route.name, attempt, "embedding attempt");
                route.provider.embed(texts)
            })
            .await;
            let latency = started.elapsed();
            let model = route.provider.model().to_string();

            match result {
                Ok(value) => {
                    self.record(
                        user_id,
                        AiTask::Embedding,
                        &route.name,
                        &model,
                        Some(value.usage),
                        latency,
                        None,
                    )
                    .await;
                    return Ok(Routed {
                        value,
                        provider: route.name.clone(),
                        model,
                        is_fallback: index > 0,
                    });
                }
                Err(err) => {
                    self.record(
                        user_id,
                        AiTask::Embedding,
                        &route.name,
                        &model,
                        None,
                        latency,
                        Some(&err),
                    )
                    .await;
                    last_err = Some(err);
                }
            }
        }

        Err(self.exhausted(AiTask::Embedding, attempted, last_err))
    }

    fn chat_routes(&self, task: AiTask) -> &[ChatRoute] {
        match task {
            AiTask::ChatSimple => &self.chat_simple,
            AiTask::ChatComplex => &self.chat_complex,
            _ => &[],
        }
    }

    fn exhausted(
        &self,
        task: AiTask,
        attempted: Vec<String>,
        last_err: Option<GatewayError>,
    ) -> RouterError {
        RouterError {
            task,
            attempted,
            last: last_err
                .unwrap_or_else(|| GatewayError::configuration("no providers configured")),
        }
    }
}
