//! Scaffold lifecycle: save and delete for rows with an identity and
//! protected timestamps.

use std::sync::Arc;

use chrono::Utc;
use rowkeeper_proto::{Statement, StatementBuilder, Transaction, Value};
use tracing::{debug, instrument};

use crate::catalog::{ConfigError, FieldKind, ModelSchema, CREATED_AT, ID, UPDATED_AT};
use crate::ddl::{self, TableOptions};
use crate::error::{Error, Result};

use super::row::Row;
use super::{execute, parse_identifier, populate_defaults, read_count, StampLog};

/// What a save has to write after the preparation phase.
#[derive(Debug)]
pub(crate) enum SavePlan {
    /// Existing row, nothing dirty.
    Noop,
    /// New row.
    Insert {
        /// Stamps applied to the row.
        stamps: StampLog,
    },
    /// Existing row with dirty attributes.
    Update {
        /// Last persisted state of the row.
        snapshot: Row,
        /// Stamps applied to the row.
        stamps: StampLog,
    },
}

/// Lifecycle engine for one scaffolded model.
///
/// The model must declare `id` (uuid), `created_at` and `updated_at`
/// (timestamps); [`ModelSchema::scaffold`] builds such a schema.
#[derive(Debug, Clone)]
pub struct Scaffold {
    schema: Arc<ModelSchema>,
}

impl Scaffold {
    /// Create the engine, checking that the scaffold fields exist.
    pub fn new(schema: Arc<ModelSchema>) -> std::result::Result<Self, ConfigError> {
        require_field(&schema, ID, "uuid", |kind| matches!(kind, FieldKind::Uuid))?;
        for timestamp in [CREATED_AT, UPDATED_AT] {
            require_field(&schema, timestamp, "timestamp", |kind| {
                matches!(kind, FieldKind::Timestamp { .. })
            })?;
        }
        Ok(Self { schema })
    }

    /// The managed schema.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// A new, empty row of this model.
    pub fn row(&self) -> Row {
        Row::new(self.schema.clone())
    }

    /// `CREATE TABLE` statement for the model.
    pub fn compile(&self, options: &TableOptions) -> Statement {
        ddl::compile(&self.schema, options)
    }

    /// Load a row by identity.
    #[instrument(skip(self, trx), fields(model = %self.schema.name()))]
    pub async fn load<T>(&self, trx: &mut T, id: &str) -> Result<Option<Row>>
    where
        T: Transaction + ?Sized,
    {
        let id = parse_identifier("id", id)?;
        self.fetch_snapshot(trx, &Value::Uuid(id)).await
    }

    /// Persist `row`.
    ///
    /// Inserts the row when it has no identity or its identity is not
    /// stored yet, otherwise updates its dirty attributes. Returns `false`
    /// when an existing row had nothing to write. `created_at` and
    /// `updated_at` may only be set by the caller when `override_protected`
    /// is true; otherwise the engine stamps them.
    #[instrument(skip(self, trx, row), fields(model = %self.schema.name()))]
    pub async fn save<T>(&self, trx: &mut T, row: &mut Row, override_protected: bool) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        match self.prepare_save(trx, row, override_protected).await? {
            SavePlan::Noop => Ok(false),
            SavePlan::Insert { stamps } => {
                let outcome = match row.insert_statement() {
                    Ok(statement) => execute(trx, &statement).await.map(|_| true),
                    Err(e) => Err(e),
                };
                unwind_on_error(outcome, stamps, row)
            }
            SavePlan::Update { snapshot, stamps } => {
                let outcome = match row.update_statement(&snapshot) {
                    Ok(Some(statement)) => execute(trx, &statement).await.map(|_| true),
                    Ok(None) => Ok(false),
                    Err(e) => Err(e),
                };
                unwind_on_error(outcome, stamps, row)
            }
        }
    }

    /// Delete `row` by identity.
    ///
    /// Returns `false` when the row has no identity or is not stored.
    /// `updated_at` is stamped with the deletion time.
    #[instrument(skip(self, trx, row), fields(model = %self.schema.name()))]
    pub async fn delete<T>(&self, trx: &mut T, row: &mut Row) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        let Some((_snapshot, stamps)) = self.prepare_delete(trx, row).await? else {
            return Ok(false);
        };
        let outcome = match self.delete_statement(row) {
            Ok(statement) => execute(trx, &statement).await.map(|_| true),
            Err(e) => Err(e),
        };
        unwind_on_error(outcome, stamps, row)
    }

    /// Check the row, resolve new-vs-existing, populate defaults, and
    /// enforce and stamp the protected columns.
    pub(crate) async fn prepare_save<T>(
        &self,
        trx: &mut T,
        row: &mut Row,
        override_protected: bool,
    ) -> Result<SavePlan>
    where
        T: Transaction + ?Sized,
    {
        self.check_model(row)?;

        let snapshot = match row.identity().cloned() {
            Some(id) => self.fetch_snapshot(trx, &id).await?,
            None => None,
        };

        populate_defaults(&self.schema, row).await?;

        let now = Utc::now();
        let mut stamps = StampLog::default();

        let Some(snapshot) = snapshot else {
            for protected in [UPDATED_AT, CREATED_AT] {
                if row.is_set(protected) {
                    if !override_protected {
                        stamps.revert(row);
                        return Err(protected_column(protected));
                    }
                } else {
                    stamps.stamp(row, protected, now)?;
                }
            }
            debug!(stamped = !stamps.is_empty(), "inserting new row");
            return Ok(SavePlan::Insert { stamps });
        };

        if !row.is_dirty(&snapshot) {
            debug!("row is clean, nothing to save");
            return Ok(SavePlan::Noop);
        }

        if !override_protected && self.edited(row, &snapshot, CREATED_AT) {
            return Err(protected_column(CREATED_AT));
        }
        if self.edited(row, &snapshot, UPDATED_AT) {
            if !override_protected {
                return Err(protected_column(UPDATED_AT));
            }
        } else {
            stamps.stamp(row, UPDATED_AT, now)?;
        }

        debug!(columns = ?row.dirty_attributes(&snapshot), "updating row");
        Ok(SavePlan::Update { snapshot, stamps })
    }

    /// Read the stored row and stamp `updated_at`; `None` when there is
    /// nothing to delete.
    pub(crate) async fn prepare_delete<T>(
        &self,
        trx: &mut T,
        row: &mut Row,
    ) -> Result<Option<(Row, StampLog)>>
    where
        T: Transaction + ?Sized,
    {
        self.check_model(row)?;

        let Some(id) = row.identity().cloned() else {
            debug!("row has no identity, nothing to delete");
            return Ok(None);
        };
        let Some(snapshot) = self.fetch_snapshot(trx, &id).await? else {
            debug!("row is not stored, nothing to delete");
            return Ok(None);
        };

        let mut stamps = StampLog::default();
        stamps.stamp(row, UPDATED_AT, Utc::now())?;
        Ok(Some((snapshot, stamps)))
    }

    /// `DELETE` statement for the row's identity.
    pub(crate) fn delete_statement(&self, row: &Row) -> Result<Statement> {
        let id = row.identity().ok_or_else(|| Error::MissingIdentity {
            model: self.schema.name().to_string(),
        })?;
        let mut builder = StatementBuilder::new();
        builder
            .push("DELETE FROM ")
            .push_identifier(self.schema.table_name())
            .push(" WHERE ")
            .push_identifier(self.id_column())
            .push(" = ")
            .push_bind(id.clone());
        Ok(builder.build())
    }

    /// Number of stored rows with the given identity.
    pub(crate) async fn count<T>(&self, trx: &mut T, id: &Value) -> Result<u64>
    where
        T: Transaction + ?Sized,
    {
        let mut builder = StatementBuilder::new();
        builder
            .push("SELECT count(*) FROM ")
            .push_identifier(self.schema.table_name())
            .push(" WHERE ")
            .push_identifier(self.id_column())
            .push(" = ")
            .push_bind(id.clone());
        read_count(execute(trx, &builder.build()).await?)
    }

    /// Current stored state of the row with the given identity.
    pub(crate) async fn fetch_snapshot<T>(&self, trx: &mut T, id: &Value) -> Result<Option<Row>>
    where
        T: Transaction + ?Sized,
    {
        let mut builder = StatementBuilder::new();
        builder
            .push("SELECT * FROM ")
            .push_identifier(self.schema.table_name())
            .push(" WHERE ")
            .push_identifier(self.id_column())
            .push(" = ")
            .push_bind(id.clone());
        let result = execute(trx, &builder.build()).await?;

        if result.rows.len() > 1 {
            return Err(Error::UnexpectedResult(format!(
                "{} rows share identity {id:?}",
                result.rows.len()
            )));
        }
        result
            .into_first()
            .map(|db_row| Row::from_db(self.schema.clone(), db_row))
            .transpose()
    }

    fn id_column(&self) -> &str {
        self.schema.column_name(ID).unwrap_or(ID)
    }

    /// Whether the caller set `attribute` to something other than its
    /// stored value.
    fn edited(&self, row: &Row, snapshot: &Row, attribute: &str) -> bool {
        row.is_set(attribute)
            && self.schema.field(attribute).is_some_and(|field| {
                field
                    .kind
                    .is_different(row.get(attribute), snapshot.get(attribute))
            })
    }

    fn check_model(&self, row: &Row) -> Result<()> {
        let schema = row.schema();
        if Arc::ptr_eq(schema, &self.schema)
            || (schema.name() == self.schema.name()
                && schema.table_name() == self.schema.table_name())
        {
            return Ok(());
        }
        Err(Error::ModelMismatch {
            expected: self.schema.name().to_string(),
            actual: schema.name().to_string(),
        })
    }
}

/// Revert `stamps` if `outcome` failed.
pub(crate) fn unwind_on_error<R>(outcome: Result<R>, stamps: StampLog, row: &mut Row) -> Result<R> {
    if outcome.is_err() {
        debug!("lifecycle call failed, reverting timestamp stamps");
        stamps.revert(row);
    }
    outcome
}

fn protected_column(column: &str) -> Error {
    Error::ProtectedColumn {
        column: column.to_string(),
    }
}

fn require_field(
    schema: &ModelSchema,
    attribute: &'static str,
    kind: &'static str,
    accepts: impl Fn(&FieldKind) -> bool,
) -> std::result::Result<(), ConfigError> {
    match schema.field(attribute) {
        Some(field) if accepts(&field.kind) => Ok(()),
        _ => Err(ConfigError::MissingScaffoldField {
            model: schema.name().to_string(),
            field: attribute,
            kind,
        }),
    }
}
