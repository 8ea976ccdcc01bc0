//! Row instances and the lifecycle engines that persist them.
//!
//! - [`Row`] - in-memory row of one model
//! - [`Scaffold`] - save/delete for models with `id`, `created_at`, and
//!   `updated_at`
//! - [`HistoricScaffold`] - scaffold lifecycle mirrored into an append-only
//!   history table, with undelete

mod historic;
mod row;
mod scaffold;

pub use historic::HistoricScaffold;
pub use row::Row;
pub use scaffold::Scaffold;

use chrono::{DateTime, Utc};
use rowkeeper_proto::{QueryResult, Statement, Transaction, Value};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::ModelSchema;
use crate::error::{Error, Result};

/// Execute one statement, logging its text.
pub(crate) async fn execute<T>(trx: &mut T, statement: &Statement) -> Result<QueryResult>
where
    T: Transaction + ?Sized,
{
    debug!(sql = statement.text(), params = statement.params().len(), "executing statement");
    Ok(trx.query(statement).await?)
}

/// Invoke the default producer of every unset field, in declaration order.
pub(crate) async fn populate_defaults(schema: &ModelSchema, row: &mut Row) -> Result<()> {
    for (attribute, field) in schema.fields() {
        if row.is_set(attribute) {
            continue;
        }
        if let Some(producer) = field.default_producer() {
            let value = producer.produce(row).await?;
            row.set(attribute, value)?;
        }
    }
    Ok(())
}

/// Parse a textual UUID argument.
pub(crate) fn parse_identifier(what: &'static str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| Error::InvalidIdentifier {
        what,
        value: value.to_string(),
    })
}

/// Read the `count` column of a `SELECT count(*)` result.
pub(crate) fn read_count(result: QueryResult) -> Result<u64> {
    let row = result
        .into_first()
        .ok_or_else(|| Error::UnexpectedResult("count query returned no rows".to_string()))?;
    let count = match row.get("count") {
        Some(Value::Int64(n)) => u64::try_from(*n).ok(),
        Some(Value::Int32(n)) => u64::try_from(*n).ok(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| Error::UnexpectedResult(format!("invalid count row: {row:?}")))
}

/// Protected-column stamps applied during one lifecycle call.
///
/// On failure the stamps are reverted in reverse order, leaving every
/// other change (such as produced defaults) in place.
#[derive(Debug, Default)]
pub(crate) struct StampLog {
    stamps: Vec<(&'static str, Option<Value>)>,
}

impl StampLog {
    /// Set `attribute` to `now`, remembering the previous value.
    pub(crate) fn stamp(
        &mut self,
        row: &mut Row,
        attribute: &'static str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let prior = row.get(attribute).cloned();
        row.set(attribute, now)?;
        self.stamps.push((attribute, prior));
        Ok(())
    }

    /// Undo every stamp.
    pub(crate) fn revert(self, row: &mut Row) {
        for (attribute, prior) in self.stamps.into_iter().rev() {
            row.restore(attribute, prior);
        }
    }

    /// Check if no stamp was applied.
    pub(crate) fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
