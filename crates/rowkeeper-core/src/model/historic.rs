//! Historic scaffold lifecycle.
//!
//! Every insert, update, and delete of the logical table is mirrored into a
//! shadow table as a complete image of the row, keyed by its own surrogate
//! `hid` and carrying the actor (`updated_by`) and a `deleted` flag. Shadow
//! rows are only ever inserted. The most recent shadow row of a deleted
//! identity can be restored with [`HistoricScaffold::undelete`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rowkeeper_proto::{Statement, StatementBuilder, Transaction, Value};
use tracing::{debug, info, instrument};

use crate::catalog::{
    ConfigError, FieldDef, GenerateUuid, ModelSchema, DELETED, HID, ID, UPDATED_AT, UPDATED_BY,
};
use crate::ddl::{self, TableOptions};
use crate::error::Result;

use super::row::Row;
use super::scaffold::{unwind_on_error, SavePlan, Scaffold};
use super::{execute, parse_identifier, populate_defaults};

/// Lifecycle engine for a scaffolded model with a history table.
#[derive(Debug, Clone)]
pub struct HistoricScaffold {
    scaffold: Scaffold,
    history: Arc<ModelSchema>,
}

impl HistoricScaffold {
    /// Create the engine, deriving the history schema.
    ///
    /// The history model is named `<Model>History` and stored in
    /// `<table>_history`.
    pub fn new(schema: Arc<ModelSchema>) -> std::result::Result<Self, ConfigError> {
        let table = format!("{}_history", schema.table_name());
        Self::with_history_table(schema, table)
    }

    /// Create the engine with an explicit history table name.
    pub fn with_history_table(
        schema: Arc<ModelSchema>,
        history_table: impl Into<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let scaffold = Scaffold::new(schema.clone())?;

        let mut builder = ModelSchema::builder(format!("{}History", schema.name()))
            .table_name(history_table)
            .field(HID, FieldDef::uuid().primary_key().with_default_producer(GenerateUuid))
            .field(UPDATED_BY, FieldDef::uuid().nullable())
            .field(DELETED, FieldDef::boolean().with_default_expression("false"));
        for (attribute, field) in schema.fields() {
            builder = builder.field(attribute, field.to_history());
        }

        Ok(Self {
            scaffold,
            history: Arc::new(builder.build()?),
        })
    }

    /// The logical model's schema.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        self.scaffold.schema()
    }

    /// The derived history schema.
    pub fn history_schema(&self) -> &Arc<ModelSchema> {
        &self.history
    }

    /// The underlying scaffold engine.
    pub fn scaffold(&self) -> &Scaffold {
        &self.scaffold
    }

    /// A new, empty row of the logical model.
    pub fn row(&self) -> Row {
        self.scaffold.row()
    }

    /// `CREATE TABLE` statements for the logical and history tables.
    pub fn compile(&self, options: &TableOptions) -> Vec<Statement> {
        vec![
            self.scaffold.compile(options),
            ddl::compile(&self.history, options),
        ]
    }

    /// Load a live row by identity.
    pub async fn load<T>(&self, trx: &mut T, id: &str) -> Result<Option<Row>>
    where
        T: Transaction + ?Sized,
    {
        self.scaffold.load(trx, id).await
    }

    /// Persist `row` and append a history entry.
    ///
    /// Behaves like [`Scaffold::save`]; every write is followed by a
    /// history insert attributed to `author`. A no-op save writes no
    /// history.
    #[instrument(skip(self, trx, row), fields(model = %self.schema().name()))]
    pub async fn save<T>(
        &self,
        trx: &mut T,
        row: &mut Row,
        override_protected: bool,
        author: Option<&str>,
    ) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        let author = author_value(author)?;

        match self.scaffold.prepare_save(trx, row, override_protected).await? {
            SavePlan::Noop => Ok(false),
            SavePlan::Insert { stamps } => {
                let outcome = self.insert_with_history(trx, row, &author).await;
                unwind_on_error(outcome, stamps, row)
            }
            SavePlan::Update { snapshot, stamps } => {
                let outcome = self.update_with_history(trx, row, &snapshot, &author).await;
                unwind_on_error(outcome, stamps, row)
            }
        }
    }

    /// Delete `row` and append a history entry flagged as deleted.
    ///
    /// Returns `false` when the row has no identity or is not stored.
    #[instrument(skip(self, trx, row), fields(model = %self.schema().name()))]
    pub async fn delete<T>(&self, trx: &mut T, row: &mut Row, author: Option<&str>) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        let author = author_value(author)?;

        let Some((snapshot, stamps)) = self.scaffold.prepare_delete(trx, row).await? else {
            return Ok(false);
        };

        let outcome = self.delete_with_history(trx, row, &snapshot, &author).await;
        unwind_on_error(outcome, stamps, row)
    }

    /// Restore the latest history image of a deleted identity.
    ///
    /// Returns `None` when a live row with `id` exists or no history is
    /// recorded for it. Otherwise the image (without `hid`, `deleted`, and
    /// `updated_by`) is saved as a new row with a fresh `updated_at`,
    /// producing a new history entry, and the restored row is returned.
    #[instrument(skip(self, trx), fields(model = %self.schema().name()))]
    pub async fn undelete<T>(
        &self,
        trx: &mut T,
        id: &str,
        author: Option<&str>,
    ) -> Result<Option<Row>>
    where
        T: Transaction + ?Sized,
    {
        let id = Value::Uuid(parse_identifier("id", id)?);
        author_value(author)?;

        if self.scaffold.count(trx, &id).await? > 0 {
            debug!("row is live, nothing to undelete");
            return Ok(None);
        }

        let Some(mut latest) = execute(trx, &self.latest_history_statement(&id))
            .await?
            .into_first()
        else {
            debug!("no history recorded");
            return Ok(None);
        };

        for attribute in [HID, DELETED, UPDATED_BY] {
            if let Some(column) = self.history.column_name(attribute) {
                latest.remove(column);
            }
        }

        let mut restored = Row::from_db(self.schema().clone(), latest)?;
        restored.set(UPDATED_AT, Utc::now())?;
        self.save(trx, &mut restored, true, author).await?;

        info!(id = ?restored.identity(), "row restored from history");
        Ok(Some(restored))
    }

    async fn insert_with_history<T>(&self, trx: &mut T, row: &Row, author: &Value) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        execute(trx, &row.insert_statement()?).await?;
        let history = self.history_row(row.values().clone(), false, author).await?;
        execute(trx, &history.insert_statement()?).await?;
        Ok(true)
    }

    async fn update_with_history<T>(
        &self,
        trx: &mut T,
        row: &Row,
        snapshot: &Row,
        author: &Value,
    ) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        let Some(update) = row.update_statement(snapshot)? else {
            return Ok(false);
        };
        execute(trx, &update).await?;
        let history = self.history_row(image(snapshot, row), false, author).await?;
        execute(trx, &history.insert_statement()?).await?;
        Ok(true)
    }

    async fn delete_with_history<T>(
        &self,
        trx: &mut T,
        row: &Row,
        snapshot: &Row,
        author: &Value,
    ) -> Result<bool>
    where
        T: Transaction + ?Sized,
    {
        let history = self.history_row(image(snapshot, row), true, author).await?;
        let history_insert = history.insert_statement()?;
        execute(trx, &self.scaffold.delete_statement(row)?).await?;
        execute(trx, &history_insert).await?;
        Ok(true)
    }

    /// Build a history row from a logical image.
    async fn history_row(
        &self,
        image: BTreeMap<String, Value>,
        deleted: bool,
        author: &Value,
    ) -> Result<Row> {
        let mut history = Row::new(self.history.clone());
        for (attribute, value) in image {
            history.set(&attribute, value)?;
        }
        history.set(DELETED, deleted)?;
        history.set(UPDATED_BY, author.clone())?;
        populate_defaults(&self.history, &mut history).await?;
        Ok(history)
    }

    fn latest_history_statement(&self, id: &Value) -> Statement {
        let mut builder = StatementBuilder::new();
        builder
            .push("SELECT * FROM ")
            .push_identifier(self.history.table_name())
            .push(" WHERE ")
            .push_identifier(self.history.column_name(ID).unwrap_or(ID))
            .push(" = ")
            .push_bind(id.clone())
            .push(" ORDER BY ")
            .push_identifier(self.history.column_name(UPDATED_AT).unwrap_or(UPDATED_AT))
            .push(" DESC LIMIT 1");
        builder.build()
    }
}

/// Snapshot values overlaid with the row's set values.
fn image(snapshot: &Row, row: &Row) -> BTreeMap<String, Value> {
    let mut image = snapshot.values().clone();
    image.extend(row.values().iter().map(|(k, v)| (k.clone(), v.clone())));
    image
}

fn author_value(author: Option<&str>) -> Result<Value> {
    match author {
        Some(author) => Ok(Value::Uuid(parse_identifier("author", author)?)),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConstraintDef, CREATED_AT};

    fn widget() -> HistoricScaffold {
        let schema = ModelSchema::scaffold("Widget")
            .field("name", FieldDef::varchar())
            .constraint("name_not_blank", ConstraintDef::check("name <> ''").unwrap())
            .build()
            .unwrap();
        HistoricScaffold::new(Arc::new(schema)).unwrap()
    }

    #[test]
    fn test_history_schema() {
        let engine = widget();
        let history = engine.history_schema();

        assert_eq!(history.name(), "WidgetHistory");
        assert_eq!(history.table_name(), "Widget_history");
        let attrs: Vec<&str> = history.fields().map(|(attr, _)| attr).collect();
        assert_eq!(
            attrs,
            vec![HID, UPDATED_BY, DELETED, ID, "name", UPDATED_AT, CREATED_AT]
        );
        assert_eq!(history.constraints().count(), 0);
        assert!(history.field(HID).unwrap().primary_key);
        assert!(!history.field(ID).unwrap().primary_key);
    }

    #[test]
    fn test_compile_both_tables() {
        let statements = widget().compile(&TableOptions::default());
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1].text(),
            "CREATE TABLE \"Widget_history\" ( \"hid\" uuid NOT NULL PRIMARY KEY, \
             \"updated_by\" uuid, \"deleted\" bool NOT NULL DEFAULT false, \
             \"id\" uuid NOT NULL, \"name\" varchar(255) NOT NULL, \
             \"updated_at\" timestamptz NOT NULL, \"created_at\" timestamptz NOT NULL )"
        );
        assert!(statements[0].text().contains("CONSTRAINT \"name_not_blank\""));
    }

    #[test]
    fn test_custom_history_table() {
        let schema = Arc::new(ModelSchema::scaffold("Widget").build().unwrap());
        let engine = HistoricScaffold::with_history_table(schema, "widget_audit").unwrap();
        assert_eq!(engine.history_schema().table_name(), "widget_audit");
    }

    #[test]
    fn test_latest_history_statement() {
        let id = Value::Uuid(uuid::Uuid::new_v4());
        let statement = widget().latest_history_statement(&id);
        assert_eq!(
            statement.text(),
            "SELECT * FROM \"Widget_history\" WHERE \"id\" = $1 ORDER BY \"updated_at\" DESC LIMIT 1"
        );
    }

    #[test]
    fn test_author_value() {
        assert_eq!(author_value(None).unwrap(), Value::Null);
        assert!(author_value(Some("nobody")).is_err());
    }
}
