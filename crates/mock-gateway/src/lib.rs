//! Mock provider implementations for router and pipeline tests.
//!
//! Each mock plays back a script of outcomes in order, repeating the final
//! entry once the script runs out, and counts how often it was called.
//! That is enough to exercise fallback order, ledger accounting, and
//! exhaustion behavior without a network.
//!
//! # Example
//!
//! ```rust
//! use mock_gateway::{script, MockIdentifier};
//! use ai_core::{GatewayError, IdentifyProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockIdentifier::new(
//!         "plant-id",
//!         script([
//!             Err(GatewayError::service("vendor down")),
//!             Ok(MockIdentifier::identification("Epipremnum aureum", 0.93)),
//!         ]),
//!     );
//!
//!     assert!(mock.identify(&[]).await.is_err());
//!     assert!(mock.identify(&[]).await.is_ok());
//!     assert_eq!(mock.calls(), 2);
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ai_core::{
    async_trait, ChatCompletion, ChatProvider, ChatRequest, ChatStream, ChatStreamEvent,
    EmbedProvider, Embedding, GatewayError, HealthAssessment, HealthProvider, Identification,
    IdentifyProvider, ModelTier, SpeciesCandidate, TokenUsage,
};
use futures::stream;

/// A play-once-then-repeat-last script of outcomes.
pub struct Script<T> {
    entries: Mutex<Vec<Result<T, GatewayError>>>,
    cursor: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn new(entries: Vec<Result<T, GatewayError>>) -> Self {
        assert!(!entries.is_empty(), "script must have at least one entry");
        Self {
            entries: Mutex::new(entries),
            cursor: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Result<T, GatewayError> {
        let entries = self.entries.lock().unwrap();
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        entries[index.min(entries.len() - 1)].clone()
    }
}

/// Build a script from an iterator of outcomes.
pub fn script<T: Clone>(
    entries: impl IntoIterator<Item = Result<T, GatewayError>>,
) -> Script<T> {
    Script::new(entries.into_iter().collect())
}

/// Convenience: a script that always succeeds with one value.
pub fn always<T: Clone>(value: T) -> Script<T> {
    Script::new(vec![Ok(value)])
}

/// Convenience: a script that always fails with one error.
pub fn always_err<T: Clone>(err: GatewayError) -> Script<T> {
    Script::new(vec![Err(err)])
}

/// A scripted identification provider.
pub struct MockIdentifier {
    name: String,
    script: Script<Identification>,
    calls: AtomicUsize,
}

impl MockIdentifier {
    pub fn new(name: impl Into<String>, script: Script<Identification>) -> Self {
        Self {
            name: name.into(),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `identify` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A plausible identification for a scientific name.
    pub fn identification(scientific_name: &str, confidence: f64) -> Identification {
        Identification {
            is_plant: true,
            top: SpeciesCandidate {
                scientific_name: scientific_name.to_string(),
                common_names: vec![],
                family: "Araceae".to_string(),
                genus: scientific_name
                    .split_whitespace()
                    .next()
                    .unwrap_or("Unknown")
                    .to_string(),
                confidence,
                similar_image_url: None,
                provider_species_id: None,
                description: None,
                toxicity: None,
            },
            alternatives: Vec::new(),
        }
    }
}

#[async_trait]
impl IdentifyProvider for MockIdentifier {
    async fn identify(&self, _images: &[String]) -> Result<Identification, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.next()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-identify"
    }
}

/// A scripted health assessment provider.
pub struct MockHealthAssessor {
    name: String,
    script: Script<HealthAssessment>,
    calls: AtomicUsize,
}

impl MockHealthAssessor {
    pub fn new(name: impl Into<String>, script: Script<HealthAssessment>) -> Self {
        Self {
            name: name.into(),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProvider for MockHealthAssessor {
    async fn assess(
        &self,
        _images: &[String],
        _symptoms: Option<&str>,
    ) -> Result<HealthAssessment, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.next()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-health"
    }
}

/// A scripted conversational provider.
pub struct MockChat {
    name: String,
    model: String,
    script: Script<ChatCompletion>,
    calls: AtomicUsize,
}

impl MockChat {
    pub fn new(name: impl Into<String>, script: Script<ChatCompletion>) -> Self {
        Self {
            name: name.into(),
            model: "mock-chat".to_string(),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A completion with plausible token counts.
    pub fn completion(content: &str) -> ChatCompletion {
        ChatCompletion {
            content: content.to_string(),
            model: "mock-chat".to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        }
    }
}

#[async_trait]
impl ChatProvider for MockChat {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatCompletion, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.next()
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, GatewayError> {
        let completion = self.chat(request).await?;
        // Split the canned response into word-sized chunks so stream
        // consumers see more than one delta.
        let mut events: Vec<Result<ChatStreamEvent, GatewayError>> = completion
            .content
            .split_inclusive(' ')
            .map(|chunk| Ok(ChatStreamEvent::Delta(chunk.to_string())))
            .collect();
        events.push(Ok(ChatStreamEvent::Done(completion.usage)));
        Ok(Box::pin(stream::iter(events)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self, _tier: ModelTier) -> &str {
        &self.model
    }
}

/// A scripted embedding provider.
pub struct MockEmbedder {
    name: String,
    script: Script<Embedding>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(name: impl Into<String>, script: Script<Embedding>) -> Self {
        Self {
            name: name.into(),
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// A 1536-dim embedding whose first component is `seed`.
    pub fn embedding(seed: f64) -> Embedding {
        let mut vector = vec![0.0; 1536];
        vector[0] = seed;
        Embedding {
            vectors: vec![vector],
            usage: TokenUsage {
                input_tokens: 8,
                output_tokens: 0,
            },
        }
    }
}

#[async_trait]
impl EmbedProvider for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Embedding, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut result = self.script.next()?;
        // Match the batch size so callers can zip texts and vectors.
        if result.vectors.len() == 1 && texts.len() > 1 {
            let vector = result.vectors[0].clone();
            result.vectors = vec![vector; texts.len()];
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "mock-embed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_script_plays_in_order_then_repeats() {
        let mock = MockIdentifier::new(
            "m",
            script([
                Err(GatewayError::service("down")),
                Ok(MockIdentifier::identification("Ficus lyrata", 0.8)),
            ]),
        );

        assert!(mock.identify(&[]).await.is_err());
        assert!(mock.identify(&[]).await.is_ok());
        // Last entry repeats.
        assert!(mock.identify(&[]).await.is_ok());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_chat_stream_chunks_then_done() {
        let mock = MockChat::new("m", always(MockChat::completion("water it weekly")));
        let request = ChatRequest {
            system: String::new(),
            turns: vec![],
            tier: ModelTier::Simple,
        };

        let mut stream = mock.chat_stream(&request).await.unwrap();
        let mut text = String::new();
        let mut done = false;
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                ChatStreamEvent::Delta(chunk) => text.push_str(&chunk),
                ChatStreamEvent::Done(usage) => {
                    done = true;
                    assert_eq!(usage.output_tokens, 50);
                }
            }
        }
        assert!(done);
        assert_eq!(text, "water it weekly");
    }

    #[tokio::test]
    async fn test_mock_embedder_matches_batch_size() {
        let mock = MockEmbedder::new("m", always(MockEmbedder::embedding(0.5)));
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = mock.embed(&texts).await.unwrap();
        assert_eq!(result.vectors.len(), 3);
        assert_eq!(result.vectors[0].len(), 1536);
    }
}
