//! ClaudeGateway implementation.

use std::pin::Pin;
use std::task::{Context, Poll};

use ai_core::{
    async_trait, first_json_as, ChatCompletion, ChatProvider, ChatRequest, ChatStream,
    ChatStreamEvent, GatewayError, HealthAssessment, HealthProvider, ModelTier, RankedIssue, Role,
    TokenUsage, UNKNOWN,
};
use futures::Stream;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api_types::{
    ApiErrorBody, ApiMessage, ContentBlock, MessagesRequest, MessagesResponse, StreamEvent,
};
use crate::config::ClaudeConfig;

/// Provider name recorded in the usage ledger.
const PROVIDER_NAME: &str = "claude";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Instruction for the vision-based health assessment fallback.
const HEALTH_PROMPT: &str = "You are a plant pathologist. Examine the plant image(s) and the \
symptom description, if any. Respond with exactly one JSON object and nothing else, in this \
shape: {\"isHealthy\": boolean, \"issues\": [{\"name\": string, \"description\": string, \
\"confidence\": number between 0 and 1, \"severity\": \"low\"|\"moderate\"|\"high\", \
\"treatments\": string[]}]}. Order issues by confidence, highest first, and order treatments \
by application order.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionHealth {
    #[serde(default)]
    is_healthy: bool,
    #[serde(default)]
    issues: Vec<VisionIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionIssue {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    treatments: Vec<String>,
}

/// Gateway to the Anthropic Messages API.
///
/// No sockets are opened at construction; each call carries the tier's
/// timeout on the request itself.
pub struct ClaudeGateway {
    client: Client,
    config: ClaudeConfig,
}

impl ClaudeGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: ClaudeConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(concat!("verdant/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GatewayError::configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Create a gateway from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(ClaudeConfig::from_env()?)
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.api_url)
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> MessagesRequest {
        let messages = request
            .turns
            .iter()
            // The Messages API accepts only user/assistant turns; system
            // content travels in the dedicated field.
            .filter(|turn| turn.role != Role::System)
            .map(|turn| ApiMessage {
                role: turn.role.as_str().to_string(),
                content: vec![ContentBlock::text(turn.content.clone())],
            })
            .collect();

        MessagesRequest {
            model: self.config.model_for(request.tier).to_string(),
            max_tokens: self.config.max_tokens,
            system: if request.system.is_empty() {
                None
            } else {
                Some(request.system.clone())
            },
            messages,
            stream: if stream { Some(true) } else { None },
        }
    }

    fn request_builder(&self, tier: ModelTier, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.config.timeout_for(tier))
            .json(body)
    }

    async fn send(&self, tier: ModelTier, body: &MessagesRequest) -> Result<MessagesResponse, GatewayError> {
        let response = self
            .request_builder(tier, body)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = ai_core::retry_after_from_headers(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body_text)
                .map(|e| e.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body_text);
            return Err(GatewayError::from_status(status, &detail, retry_after));
        }

        response.json::<MessagesResponse>().await.map_err(|e| {
            GatewayError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    fn response_text(response: &MessagesResponse) -> String {
        response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_health(text: &str) -> Result<HealthAssessment, GatewayError> {
        let parsed: VisionHealth = first_json_as(text).ok_or_else(|| {
            GatewayError::invalid_response("health response carried no usable JSON object")
        })?;

        let mut issues: Vec<RankedIssue> = parsed
            .issues
            .into_iter()
            .map(|issue| RankedIssue {
                name: if issue.name.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    issue.name
                },
                description: issue.description,
                confidence: issue.confidence.clamp(0.0, 1.0),
                severity: if issue.severity.is_empty() {
                    "low".to_string()
                } else {
                    issue.severity
                },
                treatments: issue.treatments,
            })
            .collect();
        issues.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(HealthAssessment {
            is_healthy: parsed.is_healthy,
            issues,
        })
    }
}

#[async_trait]
impl ChatProvider for ClaudeGateway {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        let body = self.build_request(request, false);
        debug!(model = %body.model, turns = request.turns.len(), "sending chat request");

        let response = self.send(request.tier, &body).await?;
        let content = Self::response_text(&response);
        if content.is_empty() {
            return Err(GatewayError::invalid_response("response contained no text"));
        }

        Ok(ChatCompletion {
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, GatewayError> {
        let body = self.build_request(request, true);
        debug!(model = %body.model, "opening chat stream");

        // Streaming calls omit the request timeout; the caller bounds the
        // whole stream at the request level.
        let source = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .eventsource()
            .map_err(|e| GatewayError::configuration(format!("cannot open event source: {}", e)))?;

        Ok(Box::pin(SseChatStream::new(source)))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, tier: ModelTier) -> &str {
        self.config.model_for(tier)
    }
}

#[async_trait]
impl HealthProvider for ClaudeGateway {
    async fn assess(
        &self,
        images: &[String],
        symptoms: Option<&str>,
    ) -> Result<HealthAssessment, GatewayError> {
        let mut content = vec![ContentBlock::text(HEALTH_PROMPT)];
        for image in images {
            content.push(ContentBlock::jpeg(image.clone()));
        }
        if let Some(symptoms) = symptoms.filter(|s| !s.is_empty()) {
            content.push(ContentBlock::text(format!("Reported symptoms: {}", symptoms)));
        }

        let body = MessagesRequest {
            model: self.config.model_simple.clone(),
            max_tokens: self.config.max_tokens,
            system: None,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content,
            }],
            stream: None,
        };

        debug!(image_count = images.len(), "sending vision health assessment");
        let response = self.send(ModelTier::Simple, &body).await?;
        Self::parse_health(&Self::response_text(&response))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model_simple
    }
}

/// Adapts the vendor SSE stream into ordered [`ChatStreamEvent`]s.
///
/// Usage accumulates across `message_start` (input tokens) and
/// `message_delta` (output tokens); the terminal `Done` event carries the
/// final tuple. The stream is finite and non-restartable.
struct SseChatStream {
    source: EventSource,
    usage: TokenUsage,
    finished: bool,
}

impl SseChatStream {
    fn new(source: EventSource) -> Self {
        Self {
            source,
            usage: TokenUsage::default(),
            finished: false,
        }
    }

    fn finish(&mut self) -> ChatStreamEvent {
        self.finished = true;
        self.source.close();
        ChatStreamEvent::Done(self.usage)
    }
}

impl Stream for SseChatStream {
    type Item = Result<ChatStreamEvent, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }

            let event = match Pin::new(&mut self.source).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    let done = self.finish();
                    return Poll::Ready(Some(Ok(done)));
                }
                Poll::Ready(Some(Err(reqwest_eventsource::Error::StreamEnded))) => {
                    let done = self.finish();
                    return Poll::Ready(Some(Ok(done)));
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    self.source.close();
                    return Poll::Ready(Some(Err(GatewayError::service(format!(
                        "stream transport error: {}",
                        e
                    )))));
                }
                Poll::Ready(Some(Ok(Event::Open))) => continue,
                Poll::Ready(Some(Ok(Event::Message(message)))) => message,
            };

            match serde_json::from_str::<StreamEvent>(&event.data) {
                Ok(StreamEvent::MessageStart { message }) => {
                    self.usage.input_tokens = message.usage.input_tokens;
                }
                Ok(StreamEvent::ContentBlockDelta { delta }) => {
                    if !delta.text.is_empty() {
                        return Poll::Ready(Some(Ok(ChatStreamEvent::Delta(delta.text))));
                    }
                }
                Ok(StreamEvent::MessageDelta { usage }) => {
                    self.usage.output_tokens = usage.output_tokens;
                }
                Ok(StreamEvent::MessageStop) => {
                    let done = self.finish();
                    return Poll::Ready(Some(Ok(done)));
                }
                Ok(StreamEvent::Other) => {}
                Err(e) => {
                    warn!(error = %e, "skipping unparseable stream event");
                }
            }
        }
    }
}
