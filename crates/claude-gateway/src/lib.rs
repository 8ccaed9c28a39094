//! Anthropic Messages gateway.
//!
//! The primary conversational provider. Supports two model tiers selected
//! per call (`simple`/`complex`), non-streaming completion with token
//! accounting, an SSE streaming variant that delivers chunks in emission
//! order, and a structured-JSON health assessment from plant images for the
//! `health_assessment` fallback position.

mod api_types;
mod config;
mod gateway;

pub use config::ClaudeConfig;
pub use gateway::ClaudeGateway;
