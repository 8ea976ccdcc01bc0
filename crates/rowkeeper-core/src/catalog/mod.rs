//! Schema catalog for rowkeeper.
//!
//! The catalog describes models: field kinds, field and constraint
//! descriptors, default-value producers, and the ordered schema that ties
//! them to a table.

mod constraint;
mod default;
mod error;
mod field;
mod schema;
mod types;

pub use constraint::{ConstraintArgs, ConstraintDef, ConstraintKind, MatchType, ReferentialAction};
pub use default::{CurrentTimestamp, DefaultProducer, FnProducer, GenerateUuid, SharedProducer};
pub use error::ConfigError;
pub use field::{DefaultValue, FieldDef, Reference};
pub use schema::{
    ModelSchema, ModelSchemaBuilder, SchemaEntry, CREATED_AT, DELETED, HID, ID, UPDATED_AT,
    UPDATED_BY,
};
pub use types::{FieldKind, TimestampPrecision, DEFAULT_VARCHAR_LENGTH};
