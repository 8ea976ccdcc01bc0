//! PostgreSQL adapter error types.

use thiserror::Error;

/// Adapter errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The driver reported a failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;
