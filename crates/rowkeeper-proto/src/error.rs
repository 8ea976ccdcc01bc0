//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A value could not be converted to the requested type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the expected type.
        expected: &'static str,
        /// Name of the type actually found.
        actual: &'static str,
    },

    /// A value was the right type but its content was malformed.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Failure reported by a transaction handle while executing a statement.
///
/// The engine never inspects or retries these; they are handed back to the
/// caller unchanged.
#[derive(Debug, Error)]
#[error("query failed: {message}")]
pub struct QueryError {
    /// Human-readable description from the driver.
    pub message: String,
    /// Underlying driver error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a query error without an underlying source.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error wrapping a driver error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
