//! Postgres persistence layer for Verdant.
//!
//! This crate provides async database operations for users, species,
//! plants, chat sessions, semantic memories, reminders, photos, and the
//! usage ledger, using SQLx with Postgres and pgvector.
//!
//! # Example
//!
//! ```no_run
//! use database::{species, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("postgres://localhost/verdant", 5).await?;
//!     db.migrate().await?;
//!
//!     let row = species::find_by_scientific_name(db.pool(), "epipremnum aureum").await?;
//!     println!("known: {}", row.is_some());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod health;
pub mod memory;
pub mod models;
pub mod photo;
pub mod plant;
pub mod reminder;
pub mod session;
pub mod species;
pub mod usage;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{
    CareDifficulty, ConversationSession, ExperienceLevel, HealthIssue, IssueStatus,
    MemoryContentType, Message, MessageRole, NewSpecies, NewUsageLogEntry, Plant, PlantHealth,
    PlantPhoto, PhotoKind, Reminder, ScoredMemory, SemanticMemory, Species, SpeciesEnrichment,
    SubscriptionTier, TreatmentStep, UsageLogEntry, User,
};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to a Postgres database.
    ///
    /// `max_connections` should be 1 when running in a serverless
    /// environment, where each instance must not hold a pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;

        tracing::info!(max_connections, "connected to database");

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is
    /// up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Cheap connectivity probe for readiness checks.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
