//! Rowkeeper - DDL compiler and audited row lifecycle for PostgreSQL.
//!
//! Describe a model once, compile it to `CREATE TABLE`, and persist rows
//! through a [`Scaffold`] or, when every change must be recorded, a
//! [`HistoricScaffold`] that mirrors each write into an append-only
//! history table.
//!
//! # Features
//!
//! - `postgres` - sqlx-backed [`postgres::PgTransaction`]
//! - `full` - everything above

pub use rowkeeper_core::*;

/// PostgreSQL transaction handle.
#[cfg(feature = "postgres")]
pub use rowkeeper_postgres as postgres;
