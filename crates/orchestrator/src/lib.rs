//! Orchestration layer for Verdant.
//!
//! This crate ties the vendor gateways to the persistence layer:
//!
//! - [`AiRouter`] - ordered fallback chains per semantic task, with usage
//!   accounting on every provider attempt
//! - [`RateLimiter`] - sliding-window caps and tier-based monthly quotas,
//!   both checked before any provider call
//! - [`SpeciesResolver`] - deduplicating enrichment of the species catalog
//! - [`IdentificationPipeline`] - validate, route and upload in parallel,
//!   resolve, shape the response
//! - [`ContextAssembler`] - parallel fan-out over user, plant, history and
//!   semantic memory with a token budget
//! - [`ChatPipeline`] - context assembly, tier decision, routing,
//!   transactional persistence, and memory extraction
//! - [`PlantService`] - plant creation with the watering cadence derived
//!   from the species' free-text watering description

pub mod assess;
pub mod chat;
pub mod context;
pub mod cost;
pub mod error;
pub mod identify;
pub mod limiter;
pub mod memory;
pub mod plants;
pub mod prompt;
pub mod router;
pub mod species;

pub use assess::HealthPipeline;
pub use chat::{ChatOutcome, ChatPipeline, ChatStreamHandle};
pub use context::{AssembledContext, ContextAssembler, TokenBudget};
pub use error::OrchestratorError;
pub use identify::{IdentificationPipeline, IdentifyResponse};
pub use limiter::{QuotaConfig, RateLimiter, SlidingWindows};
pub use plants::{NewPlantRequest, PlantService};
pub use router::{AiRouter, Routed, RouterConfig, RouterError};
pub use species::SpeciesResolver;
