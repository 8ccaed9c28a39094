//! OpenAiGateway implementation.

use ai_core::{
    async_trait, ChatCompletion, ChatProvider, ChatRequest, ChatStream, ChatStreamEvent,
    EmbedProvider, Embedding, GatewayError, ModelTier, TokenUsage,
};
use futures::stream;
use reqwest::Client;
use tracing::debug;

use crate::api_types::{
    ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, EmbeddingRequest,
    EmbeddingResponse,
};
use crate::config::OpenAiConfig;

/// Provider name recorded in the usage ledger.
const PROVIDER_NAME: &str = "openai";

/// Dimension every embedding must have; anything else would corrupt the
/// semantic memory index.
const EMBEDDING_DIMENSIONS: usize = 1536;

/// Gateway to the OpenAI chat completions and embeddings APIs.
///
/// No sockets are opened at construction.
pub struct OpenAiGateway {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self, GatewayError> {
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
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
        timeout: std::time::Duration,
    ) -> Result<R, GatewayError>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(timeout)
            .json(body)
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

        response.json::<R>().await.map_err(|e| {
            GatewayError::invalid_response(format!("failed to parse response: {}", e))
        })
    }

    fn build_chat_request(&self, request: &ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage::system(request.system.clone()));
        }
        for turn in &request.turns {
            messages.push(ChatMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            });
        }

        ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiGateway {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        let body = self.build_chat_request(request);
        debug!(model = %body.model, turns = request.turns.len(), "sending fallback chat request");

        let response: ChatCompletionResponse = self
            .post_json("/v1/chat/completions", &body, self.config.chat_timeout)
            .await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GatewayError::invalid_response("response contained no text"));
        }

        let usage = response.usage.unwrap_or_default();
        Ok(ChatCompletion {
            content,
            model: response.model,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, GatewayError> {
        // The fallback does not stream natively; it satisfies the ordered
        // incremental contract by emitting the completion as a single
        // chunk followed by the usage tuple.
        let completion = self.chat(request).await?;
        let events = vec![
            Ok(ChatStreamEvent::Delta(completion.content)),
            Ok(ChatStreamEvent::Done(completion.usage)),
        ];
        Ok(Box::pin(stream::iter(events)))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self, _tier: ModelTier) -> &str {
        // One fallback model serves both tiers.
        &self.config.chat_model
    }
}

#[async_trait]
impl EmbedProvider for OpenAiGateway {
    async fn embed(&self, texts: &[String]) -> Result<Embedding, GatewayError> {
        if texts.is_empty() {
            return Err(GatewayError::invalid_response("nothing to embed"));
        }

        let body = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: texts.to_vec(),
        };
        debug!(batch = texts.len(), "sending embedding request");

        let response: EmbeddingResponse = self
            .post_json("/v1/embeddings", &body, self.config.embedding_timeout)
            .await?;

        if response.data.len() != texts.len() {
            return Err(GatewayError::invalid_response(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        // The vendor tags rows with their input index; re-sort to be safe.
        let mut rows = response.data;
        rows.sort_by_key(|row| row.index);

        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            if row.embedding.len() != EMBEDDING_DIMENSIONS {
                return Err(GatewayError::invalid_response(format!(
                    "expected {} dimensions, got {}",
                    EMBEDDING_DIMENSIONS,
                    row.embedding.len()
                )));
            }
            vectors.push(row.embedding);
        }

        let usage = response.usage.unwrap_or_default();
        Ok(Embedding {
            vectors,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: 0,
            },
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_core::ChatTurn;

    fn test_gateway() -> OpenAiGateway {
        OpenAiGateway::new(OpenAiConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_chat_request_prepends_system() {
        let gateway = test_gateway();
        let request = ChatRequest {
            system: "Be brief.".to_string(),
            turns: vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
            tier: ModelTier::Simple,
        };

        let body = gateway.build_chat_request(&request);
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].role, "user");
        assert_eq!(body.messages[2].role, "assistant");
    }

    #[test]
    fn test_build_chat_request_without_system() {
        let gateway = test_gateway();
        let request = ChatRequest {
            system: String::new(),
            turns: vec![ChatTurn::user("hi")],
            tier: ModelTier::Complex,
        };

        let body = gateway.build_chat_request(&request);
        assert_eq!(body.messages.len(), 1);
        // One fallback model regardless of tier.
        assert_eq!(body.model, gateway.config.chat_model);
    }

    #[test]
    fn test_embedding_response_parsing() {
        let json = r#"{"data": [{"index": 1, "embedding": [0.1]}, {"index": 0, "embedding": [0.2]}], "usage": {"prompt_tokens": 7}}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.usage.unwrap().prompt_tokens, 7);
    }
}
