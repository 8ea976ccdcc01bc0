//! Model schemas.
//!
//! A [`ModelSchema`] is the immutable, ordered description of one model:
//! its fields and table-level constraints keyed by attribute name, plus the
//! table it is stored in. Schemas are built once through
//! [`ModelSchemaBuilder`] and then shared (usually behind an `Arc`) by rows,
//! the DDL compiler, and the lifecycle engines.

use std::collections::HashSet;

use super::constraint::ConstraintDef;
use super::default::GenerateUuid;
use super::error::ConfigError;
use super::field::FieldDef;

/// Identity attribute of scaffolded models.
pub const ID: &str = "id";
/// Creation timestamp attribute of scaffolded models.
pub const CREATED_AT: &str = "created_at";
/// Last-modification timestamp attribute of scaffolded models.
pub const UPDATED_AT: &str = "updated_at";
/// Surrogate key of history rows.
pub const HID: &str = "hid";
/// Actor recorded on history rows.
pub const UPDATED_BY: &str = "updated_by";
/// Deletion flag recorded on history rows.
pub const DELETED: &str = "deleted";

/// One declared schema attribute.
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    /// A column.
    Field(FieldDef),
    /// A table-level constraint.
    Constraint(ConstraintDef),
}

/// Immutable description of a model.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    table_name: String,
    entries: Vec<(String, SchemaEntry)>,
}

impl ModelSchema {
    /// Start a schema for the model `name`.
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            table_name: None,
            entries: Vec::new(),
            timestamps: false,
        }
    }

    /// Start a scaffolded schema.
    ///
    /// The schema begins with `id` (uuid primary key, generated on save);
    /// `updated_at` and `created_at` timestamps are appended when the
    /// builder is finished.
    pub fn scaffold(name: impl Into<String>) -> ModelSchemaBuilder {
        let mut builder = Self::builder(name).field(
            ID,
            FieldDef::uuid()
                .primary_key()
                .with_default_producer(GenerateUuid),
        );
        builder.timestamps = true;
        builder
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name; defaults to the model name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.entries.iter().map(|(attr, entry)| (attr.as_str(), entry))
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.entries.iter().filter_map(|(attr, entry)| match entry {
            SchemaEntry::Field(field) => Some((attr.as_str(), field)),
            SchemaEntry::Constraint(_) => None,
        })
    }

    /// Constraints in declaration order.
    pub fn constraints(&self) -> impl Iterator<Item = (&str, &ConstraintDef)> {
        self.entries.iter().filter_map(|(attr, entry)| match entry {
            SchemaEntry::Constraint(constraint) => Some((attr.as_str(), constraint)),
            SchemaEntry::Field(_) => None,
        })
    }

    /// Look up a field by attribute name.
    pub fn field(&self, attribute: &str) -> Option<&FieldDef> {
        self.fields()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, field)| field)
    }

    /// First field flagged as primary key.
    pub fn primary_key(&self) -> Option<(&str, &FieldDef)> {
        self.fields().find(|(_, field)| field.primary_key)
    }

    /// Check if `attribute` names a field.
    pub fn has_field(&self, attribute: &str) -> bool {
        self.field(attribute).is_some()
    }

    /// Resolve a key that may be an attribute name or a column name.
    ///
    /// Column-name overrides take precedence, matching how database rows
    /// are keyed.
    pub fn attribute_for_column(&self, key: &str) -> Option<&str> {
        self.fields()
            .find(|(_, field)| field.column_name.as_deref() == Some(key))
            .or_else(|| self.fields().find(|(attr, _)| *attr == key))
            .map(|(attr, _)| attr)
    }

    /// Column name for an attribute, if it is a field.
    pub fn column_name<'a>(&'a self, attribute: &'a str) -> Option<&'a str> {
        self.field(attribute).map(|field| field.column(attribute))
    }
}

/// Builder for [`ModelSchema`].
#[derive(Debug)]
pub struct ModelSchemaBuilder {
    name: String,
    table_name: Option<String>,
    entries: Vec<(String, SchemaEntry)>,
    timestamps: bool,
}

impl ModelSchemaBuilder {
    /// Store the model in `table_name` instead of a table named after it.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Declare a field.
    pub fn field(mut self, attribute: impl Into<String>, field: FieldDef) -> Self {
        self.entries
            .push((attribute.into(), SchemaEntry::Field(field)));
        self
    }

    /// Declare a table-level constraint.
    ///
    /// Unnamed constraints are emitted under the attribute name.
    pub fn constraint(mut self, attribute: impl Into<String>, constraint: ConstraintDef) -> Self {
        self.entries
            .push((attribute.into(), SchemaEntry::Constraint(constraint)));
        self
    }

    /// Validate and finish the schema.
    pub fn build(mut self) -> Result<ModelSchema, ConfigError> {
        if self.timestamps {
            self.entries
                .push((UPDATED_AT.to_string(), SchemaEntry::Field(FieldDef::timestamp())));
            self.entries
                .push((CREATED_AT.to_string(), SchemaEntry::Field(FieldDef::timestamp())));
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::Empty { what: "model name" });
        }
        let table_name = self.table_name.unwrap_or_else(|| self.name.clone());
        if table_name.trim().is_empty() {
            return Err(ConfigError::Empty { what: "table name" });
        }

        let mut attributes = HashSet::new();
        let mut columns = HashSet::new();
        for (attribute, entry) in &self.entries {
            if attribute.trim().is_empty() {
                return Err(ConfigError::Empty { what: "attribute name" });
            }
            if !attributes.insert(attribute.as_str()) {
                return Err(ConfigError::DuplicateAttribute {
                    model: self.name.clone(),
                    attribute: attribute.clone(),
                });
            }
            if let SchemaEntry::Field(field) = entry {
                let column = field.column(attribute);
                if column.trim().is_empty() {
                    return Err(ConfigError::Empty { what: "column name" });
                }
                if !columns.insert(column) {
                    return Err(ConfigError::DuplicateColumn {
                        model: self.name.clone(),
                        column: column.to_string(),
                    });
                }
            }
        }

        Ok(ModelSchema {
            name: self.name,
            table_name,
            entries: self.entries,
        })
    }
}
