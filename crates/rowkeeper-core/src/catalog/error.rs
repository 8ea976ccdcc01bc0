//! Configuration errors raised while building descriptors.

use thiserror::Error;

/// Malformed descriptor arguments.
///
/// These are raised when a field, constraint, schema, or option set is
/// constructed, and are never recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Zero or several constraint kinds were given.
    #[error("there must be exactly one constraint defined, found {found}")]
    ConstraintKindCount {
        /// Number of kinds present.
        found: usize,
    },

    /// A list was empty after removing blank entries.
    #[error("{part} can't be an empty array")]
    EmptyList {
        /// Constraint part that was empty.
        part: &'static str,
    },

    /// A required text part was blank.
    #[error("{what} must not be empty")]
    Empty {
        /// The blank part.
        what: &'static str,
    },

    /// `DEFERRABLE` / `INITIALLY ...` was requested on a check constraint.
    #[error("check constraints cannot be marked deferrable")]
    DeferrableCheck,

    /// A foreign key was declared without a referenced table.
    #[error("foreign key constraints require ref_table")]
    MissingRefTable,

    /// An option was supplied that the constraint kind does not accept.
    #[error("{option} is not valid on a {kind} constraint")]
    MisplacedOption {
        /// The option name.
        option: &'static str,
        /// The constraint kind.
        kind: &'static str,
    },

    /// A keyword outside the allowed set.
    #[error("{part} can only be one of {allowed}, got {value:?}")]
    InvalidKeyword {
        /// Which option was being parsed.
        part: &'static str,
        /// The rejected input.
        value: String,
        /// The accepted spellings.
        allowed: &'static str,
    },

    /// The same attribute name was declared twice.
    #[error("duplicate attribute {attribute} in {model}")]
    DuplicateAttribute {
        /// Model name.
        model: String,
        /// Attribute name.
        attribute: String,
    },

    /// Two fields map to the same column.
    #[error("duplicate column {column} in {model}")]
    DuplicateColumn {
        /// Model name.
        model: String,
        /// Column name.
        column: String,
    },

    /// A referenced attribute is not a field of the model.
    #[error("{attribute} is not a field in {model}")]
    UnknownAttribute {
        /// Model name.
        model: String,
        /// Attribute name.
        attribute: String,
    },

    /// A lifecycle engine was built for a model lacking a required field.
    #[error("model {model} requires field {field} of kind {kind}")]
    MissingScaffoldField {
        /// Model name.
        model: String,
        /// Required attribute.
        field: &'static str,
        /// Required field kind.
        kind: &'static str,
    },

    /// Options or descriptor arguments had the wrong shape or types.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::EmptyList { part: "unique" }.to_string(),
            "unique can't be an empty array"
        );
        assert_eq!(
            ConfigError::DeferrableCheck.to_string(),
            "check constraints cannot be marked deferrable"
        );
        assert!(ConfigError::ConstraintKindCount { found: 0 }
            .to_string()
            .contains("exactly one"));
    }
}
