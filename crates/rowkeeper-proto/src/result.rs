//! Result types returned by a transaction handle.

use std::collections::BTreeMap;

use crate::value::Value;

/// A raw database row keyed by column name.
pub type DbRow = BTreeMap<String, Value>;

/// Outcome of executing one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows produced by the statement (empty for most writes).
    pub rows: Vec<DbRow>,
    /// Number of rows produced or affected.
    pub row_count: u64,
}

impl QueryResult {
    /// Result of a statement that returned rows.
    pub fn with_rows(rows: Vec<DbRow>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// Result of a write that affected `row_count` rows.
    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    /// Check if no rows were produced or affected.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Take the first row, if any.
    pub fn into_first(self) -> Option<DbRow> {
        self.rows.into_iter().next()
    }
}
