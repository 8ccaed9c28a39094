//! Plant.id gateway.
//!
//! Wraps the Plant.id REST API behind the [`ai_core::IdentifyProvider`] and
//! [`ai_core::HealthProvider`] traits. Accepts 1-5 bare base64 images,
//! returns the top suggestion plus up to four alternatives along with the
//! vendor's is-plant signal, and classifies transport/status failures for
//! the retry harness.

mod api_types;
mod config;
mod gateway;

pub use config::PlantIdConfig;
pub use gateway::PlantIdGateway;
