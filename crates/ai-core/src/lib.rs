//! Core types and plumbing shared by all Verdant AI provider gateways.
//!
//! This crate provides the shared surface between the vendor gateway crates
//! and the orchestrator:
//!
//! - [`GatewayError`] / [`ErrorKind`] - uniform error classification so the
//!   retry harness and router can decide what is worth retrying
//! - [`RetryPolicy`] / [`run_with_retry`] - bounded execution with
//!   exponential backoff, jitter, per-attempt timeouts, and cancellation
//! - [`AiTask`] / [`ModelTier`] - the semantic task vocabulary
//! - Provider traits ([`IdentifyProvider`], [`HealthProvider`],
//!   [`ChatProvider`], [`EmbedProvider`]) - the narrow call surfaces each
//!   vendor gateway implements
//! - Image helpers for base64 normalization and size validation
//!
//! # Example
//!
//! ```rust
//! use ai_core::{GatewayError, ErrorKind};
//!
//! let err = GatewayError::rate_limit("too many requests", None);
//! assert!(err.is_retryable());
//! assert_eq!(err.code(), "RATE_LIMIT");
//! ```

mod error;
mod extract;
mod image;
mod provider;
mod retry;
mod task;
mod types;

pub use error::{parse_retry_after, retry_after_from_headers, ErrorKind, GatewayError};
pub use extract::{first_json_as, first_json_object};
pub use image::{
    estimated_decoded_size, normalize_and_validate, normalize_base64_image, ImageError,
    MAX_IMAGE_BYTES,
};
pub use provider::{ChatProvider, ChatStream, EmbedProvider, HealthProvider, IdentifyProvider};
pub use retry::{run_with_retry, RetryPolicy};
pub use task::{AiTask, ModelTier};
pub use types::{
    ChatCompletion, ChatRequest, ChatStreamEvent, ChatTurn, Embedding, HealthAssessment,
    Identification, RankedIssue, Role, SpeciesCandidate, TokenUsage, UNKNOWN,
};

// Re-export async_trait for implementors.
pub use async_trait::async_trait;
// Re-export the cancellation token used across every externally visible call.
pub use tokio_util::sync::CancellationToken;
