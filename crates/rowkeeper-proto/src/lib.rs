//! Rowkeeper protocol types.
//!
//! This crate defines the vocabulary the persistence engine speaks with the
//! outside world: runtime values, parameterized statements, the rows a
//! statement yields, and the transaction handle that executes statements.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for bound parameters and result columns
//! - [`statement`] - Parameterized SQL statements and identifier quoting
//! - [`result`] - Result rows returned by a transaction handle
//! - [`transaction`] - The transaction handle contract
//! - [`error`] - Protocol error types

pub mod error;
pub mod result;
pub mod statement;
pub mod transaction;
pub mod value;

pub use error::{Error, QueryError};
pub use result::{DbRow, QueryResult};
pub use statement::{quote_identifier, Statement, StatementBuilder};
pub use transaction::Transaction;
pub use value::Value;
