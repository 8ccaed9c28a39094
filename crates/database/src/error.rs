//! Database error types.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// Disallowed state transition
    #[error("invalid {entity} transition: {detail}")]
    InvalidTransition { entity: &'static str, detail: String },
}

impl DatabaseError {
    /// Whether the underlying failure was a unique-constraint violation.
    ///
    /// The species resolver uses this to detect insert races: the loser
    /// re-reads the winning row and proceeds to enrichment.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::AlreadyExists { .. } => true,
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
