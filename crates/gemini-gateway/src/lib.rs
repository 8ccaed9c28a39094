//! Gemini vision gateway.
//!
//! Used as the fallback identification provider: the model receives the
//! images with a strict JSON instruction and the gateway extracts the first
//! JSON object from whatever prose or markdown surrounds it. Parse failures
//! never error on their own - they map to a sentinel low-confidence result
//! so the router can still complete the chain.

mod config;
mod gateway;

pub use config::GeminiConfig;
pub use gateway::GeminiGateway;
