//! Row instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use rowkeeper_proto::{DbRow, Statement, StatementBuilder, Value};

use crate::catalog::{FieldDef, ModelSchema};
use crate::error::{Error, Result};

/// An in-memory row of one model.
///
/// Values are keyed by attribute name and held in their decoded, canonical
/// form. An attribute that is absent from the map is *unset*; unset
/// attributes are never written and never take part in the dirty diff.
#[derive(Debug, Clone)]
pub struct Row {
    schema: Arc<ModelSchema>,
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Create a row with every attribute unset.
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Create a row from user-supplied key/value pairs.
    ///
    /// Keys may be attribute names or column names. Unknown keys are
    /// rejected, and each value is canonicalized by its field kind.
    pub fn from_values<K, V>(
        schema: Arc<ModelSchema>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut row = Self::new(schema);
        for (key, value) in values {
            let attribute = row
                .schema
                .attribute_for_column(key.as_ref())
                .ok_or_else(|| Error::UnknownField {
                    model: row.schema.name().to_string(),
                    field: key.as_ref().to_string(),
                })?
                .to_string();
            row.set(&attribute, value)?;
        }
        Ok(row)
    }

    /// Create a row from a raw database row keyed by column name.
    pub fn from_db(schema: Arc<ModelSchema>, db_row: DbRow) -> Result<Self> {
        Self::from_values(schema, db_row)
    }

    /// The row's schema.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Get an attribute's value; `None` if unset.
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Set an attribute, canonicalizing the value by its field kind.
    pub fn set(&mut self, attribute: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.field(attribute)?;
        let value = field
            .kind
            .decode(value.into())
            .map_err(|source| Error::InvalidValue {
                field: attribute.to_string(),
                source,
            })?;
        self.values.insert(attribute.to_string(), value);
        Ok(())
    }

    /// Unset an attribute, returning its previous value.
    pub fn unset(&mut self, attribute: &str) -> Option<Value> {
        self.values.remove(attribute)
    }

    /// Check if an attribute is set (a NULL value counts as set).
    pub fn is_set(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    /// All set attributes.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Primary-key value, if set and not NULL.
    pub fn identity(&self) -> Option<&Value> {
        let (attribute, _) = self.schema.primary_key()?;
        self.get(attribute).filter(|value| !value.is_null())
    }

    /// Restore a value that was previously read from this row.
    pub(crate) fn restore(&mut self, attribute: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.values.insert(attribute.to_string(), value);
            }
            None => {
                self.values.remove(attribute);
            }
        }
    }

    /// Encoded values keyed by column name.
    pub fn to_db_row(&self) -> Result<DbRow> {
        self.encoded_columns(|_| true)
            .map(|columns| columns.into_iter().collect())
    }

    /// `INSERT` statement for every set attribute.
    pub fn insert_statement(&self) -> Result<Statement> {
        let columns = self.encoded_columns(|_| true)?;

        let mut builder = StatementBuilder::new();
        builder
            .push("INSERT INTO ")
            .push_identifier(self.schema.table_name());
        if columns.is_empty() {
            builder.push(" DEFAULT VALUES");
            return Ok(builder.build());
        }

        let (names, values): (Vec<String>, Vec<Value>) = columns.into_iter().unzip();
        builder
            .push(" (")
            .push_separated(&names, ", ", |b, name| {
                b.push_identifier(name);
            })
            .push(") VALUES (")
            .push_separated(values, ", ", |b, value| {
                b.push_bind(value);
            })
            .push(")");
        Ok(builder.build())
    }

    /// `UPDATE` statement for the attributes that differ from `snapshot`.
    ///
    /// Returns `None` when nothing is dirty.
    pub fn update_statement(&self, snapshot: &Row) -> Result<Option<Statement>> {
        let dirty = self.dirty_attributes(snapshot);
        if dirty.is_empty() {
            return Ok(None);
        }

        let (key_attribute, key_field) =
            self.schema
                .primary_key()
                .ok_or_else(|| Error::MissingIdentity {
                    model: self.schema.name().to_string(),
                })?;
        let key = snapshot
            .identity()
            .ok_or_else(|| Error::MissingIdentity {
                model: self.schema.name().to_string(),
            })?;
        let key = encode(key_attribute, key_field, key)?;

        let columns = self.encoded_columns(|attribute| dirty.iter().any(|d| *d == attribute))?;

        let mut builder = StatementBuilder::new();
        builder
            .push("UPDATE ")
            .push_identifier(self.schema.table_name())
            .push(" SET ")
            .push_separated(columns, ", ", |b, (column, value)| {
                b.push_identifier(&column).push(" = ").push_bind(value);
            })
            .push(" WHERE ")
            .push_identifier(key_field.column(key_attribute))
            .push(" = ")
            .push_bind(key);
        Ok(Some(builder.build()))
    }

    /// Attributes set on this row whose values differ from `snapshot`.
    pub fn dirty_attributes(&self, snapshot: &Row) -> Vec<&str> {
        self.schema
            .fields()
            .filter(|(attribute, field)| {
                self.is_set(attribute)
                    && field
                        .kind
                        .is_different(self.get(attribute), snapshot.get(attribute))
            })
            .map(|(attribute, _)| attribute)
            .collect()
    }

    /// Check if any set attribute differs from `snapshot`.
    pub fn is_dirty(&self, snapshot: &Row) -> bool {
        !self.dirty_attributes(snapshot).is_empty()
    }

    fn field(&self, attribute: &str) -> Result<&FieldDef> {
        self.schema
            .field(attribute)
            .ok_or_else(|| Error::UnknownField {
                model: self.schema.name().to_string(),
                field: attribute.to_string(),
            })
    }

    /// Encoded `(column, value)` pairs for set attributes, in schema order.
    fn encoded_columns(&self, include: impl Fn(&str) -> bool) -> Result<Vec<(String, Value)>> {
        let mut columns = Vec::new();
        for (attribute, field) in self.schema.fields() {
            let Some(value) = self.get(attribute) else {
                continue;
            };
            if !include(attribute) {
                continue;
            }
            columns.push((
                field.column(attribute).to_string(),
                encode(attribute, field, value)?,
            ));
        }
        Ok(columns)
    }
}

fn encode(attribute: &str, field: &FieldDef, value: &Value) -> Result<Value> {
    field
        .kind
        .encode(value)
        .map_err(|source| Error::InvalidValue {
            field: attribute.to_string(),
            source,
        })
}
