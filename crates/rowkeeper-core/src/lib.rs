//! Rowkeeper Core - schema catalog, DDL compiler, and row lifecycle engines.
//!
//! Models are described once as an immutable [`ModelSchema`]. The DDL
//! compiler turns a schema into its `CREATE TABLE` statement, and the
//! lifecycle engines ([`Scaffold`], [`HistoricScaffold`]) persist
//! [`Row`]s through a caller-supplied [`Transaction`], issuing every
//! statement in order within that transaction.

pub mod catalog;
pub mod ddl;
pub mod error;
pub mod model;

pub use catalog::{
    ConfigError, ConstraintArgs, ConstraintDef, ConstraintKind, CurrentTimestamp, DefaultProducer,
    DefaultValue, FieldDef, FieldKind, FnProducer, GenerateUuid, MatchType, ModelSchema,
    ModelSchemaBuilder, ReferentialAction, TimestampPrecision,
};
pub use ddl::{compile, TableOptions};
pub use error::{Error, Result};
pub use model::{HistoricScaffold, Row, Scaffold};

/// Re-export protocol types.
pub use rowkeeper_proto as proto;
pub use rowkeeper_proto::Transaction;
