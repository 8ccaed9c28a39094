//! The narrow call surfaces each vendor gateway implements.
//!
//! Traits are object-safe so the router can hold heterogeneous chains as
//! `Arc<dyn ...Provider>`. Implementations must not open network sockets at
//! construction; the first call pays any connection cost.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::GatewayError;
use crate::task::ModelTier;
use crate::types::{
    ChatCompletion, ChatRequest, ChatStreamEvent, Embedding, HealthAssessment, Identification,
};

/// A stream of chat events, finite and non-restartable.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, GatewayError>> + Send>>;

/// A provider that can identify a plant species from images.
#[async_trait]
pub trait IdentifyProvider: Send + Sync {
    /// Identify the species in 1-5 bare base64 images.
    async fn identify(&self, images: &[String]) -> Result<Identification, GatewayError>;

    /// Stable provider name recorded in the usage ledger (e.g. "plant-id").
    fn name(&self) -> &str;

    /// Model label recorded in the usage ledger.
    fn model(&self) -> &str;
}

/// A provider that can assess plant health from images and symptoms.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Assess 1-3 bare base64 images, optionally with a symptom description.
    async fn assess(
        &self,
        images: &[String],
        symptoms: Option<&str>,
    ) -> Result<HealthAssessment, GatewayError>;

    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

/// A conversational provider.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Complete a conversation and return the full response.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion, GatewayError>;

    /// Stream a conversation as incremental chunks in emission order,
    /// finishing with a [`ChatStreamEvent::Done`] carrying total usage.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, GatewayError>;

    fn name(&self) -> &str;

    /// Model label for a tier, recorded in the usage ledger.
    fn model(&self, tier: ModelTier) -> &str;
}

/// An embedding provider. There is no fallback for embeddings: vector
/// dimensions differ across vendors, so a substitute would poison the
/// semantic memory index.
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    /// Embed one or more texts, preserving input order.
    async fn embed(&self, texts: &[String]) -> Result<Embedding, GatewayError>;

    fn name(&self) -> &str;
    fn model(&self) -> &str;
}
