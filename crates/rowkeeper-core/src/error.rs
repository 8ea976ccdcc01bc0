//! Core error types.

use crate::catalog::ConfigError;
use rowkeeper_proto::QueryError;
use thiserror::Error;

/// Lifecycle and row errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed descriptor or model definition.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A protected column was edited without the override flag.
    #[error("editing {column} is forbidden without override flag")]
    ProtectedColumn {
        /// Attribute that was edited.
        column: String,
    },

    /// A supplied identifier is not a valid UUID.
    #[error("{what} must be a valid UUID, got {value:?}")]
    InvalidIdentifier {
        /// Which argument was invalid (`id`, `author`).
        what: &'static str,
        /// The rejected input.
        value: String,
    },

    /// An attribute or column does not belong to the model.
    #[error("{field} is not a field in {model}")]
    UnknownField {
        /// Model name.
        model: String,
        /// Offending attribute or column name.
        field: String,
    },

    /// A value could not be encoded or decoded for its field.
    #[error("invalid value for {field}: {source}")]
    InvalidValue {
        /// Attribute name.
        field: String,
        /// Underlying conversion failure.
        #[source]
        source: rowkeeper_proto::Error,
    },

    /// A row was handed to the lifecycle engine of another model.
    #[error("row belongs to model {actual}, expected {expected}")]
    ModelMismatch {
        /// Model the engine manages.
        expected: String,
        /// Model the row was built for.
        actual: String,
    },

    /// A row needs an identity for the requested statement but has none.
    #[error("{model} row has no identity")]
    MissingIdentity {
        /// Model name.
        model: String,
    },

    /// The database returned something the engine cannot interpret.
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),

    /// The transaction handle failed to execute a statement.
    #[error(transparent)]
    Persistence(#[from] QueryError),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from the transaction handle.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }

    /// Check if this error is a protected-column violation.
    pub fn is_protected_column(&self) -> bool {
        matches!(self, Error::ProtectedColumn { .. })
    }
}
