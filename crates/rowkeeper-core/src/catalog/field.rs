//! Field definitions for models.

use std::sync::Arc;

use rowkeeper_proto::quote_identifier;

use super::default::{DefaultProducer, SharedProducer};
use super::error::ConfigError;
use super::schema::ModelSchema;
use super::types::FieldKind;

/// A column declared by a model.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Column kind.
    pub kind: FieldKind,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default-value policy.
    pub default: DefaultValue,
    /// Whether the column is the primary key.
    pub primary_key: bool,
    /// Column name, when it differs from the attribute name.
    pub column_name: Option<String>,
    /// Referenced table and column for foreign-key fields.
    pub references: Option<Reference>,
}

/// Default value for a field.
#[derive(Debug, Clone, Default)]
pub enum DefaultValue {
    /// No default.
    #[default]
    None,
    /// SQL expression emitted as the column `DEFAULT`.
    Expression(String),
    /// Producer invoked during save when the field is unset.
    Producer(SharedProducer),
}

/// Foreign-key target of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

impl FieldDef {
    /// Create a NOT NULL field of the given kind.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
            default: DefaultValue::None,
            primary_key: false,
            column_name: None,
            references: None,
        }
    }

    /// `int` field.
    pub fn int() -> Self {
        Self::new(FieldKind::Int)
    }

    /// `bigint` field.
    pub fn big_int() -> Self {
        Self::new(FieldKind::BigInt)
    }

    /// `bool` field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    /// `varchar(255)` field.
    pub fn varchar() -> Self {
        Self::new(FieldKind::varchar())
    }

    /// `text` field.
    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    /// `uuid` field.
    pub fn uuid() -> Self {
        Self::new(FieldKind::Uuid)
    }

    /// `timestamptz` field.
    pub fn timestamp() -> Self {
        Self::new(FieldKind::timestamp())
    }

    /// `bytea` field.
    pub fn binary() -> Self {
        Self::new(FieldKind::Binary)
    }

    /// `bytea` field held as base64 text.
    pub fn base64_binary() -> Self {
        Self::new(FieldKind::Base64Binary)
    }

    /// `bytea` field held as URL-safe base64 text.
    pub fn base64_url_safe_binary() -> Self {
        Self::new(FieldKind::Base64UrlSafeBinary)
    }

    /// Field referencing `attribute` of another model.
    ///
    /// The new field takes the referenced field's kind and codec.
    pub fn references(target: &ModelSchema, attribute: &str) -> Result<Self, ConfigError> {
        let referenced = target
            .field(attribute)
            .ok_or_else(|| ConfigError::UnknownAttribute {
                model: target.name().to_string(),
                attribute: attribute.to_string(),
            })?;

        let mut field = Self::new(referenced.kind);
        field.references = Some(Reference {
            table: target.table_name().to_string(),
            column: referenced.column(attribute).to_string(),
        });
        Ok(field)
    }

    /// Allow NULL.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the column name.
    pub fn with_column_name(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Set an SQL `DEFAULT` expression.
    pub fn with_default_expression(mut self, expression: impl Into<String>) -> Self {
        self.default = DefaultValue::Expression(expression.into());
        self
    }

    /// Set a producer invoked on save when the field is unset.
    pub fn with_default_producer(mut self, producer: impl DefaultProducer + 'static) -> Self {
        self.default = DefaultValue::Producer(Arc::new(producer));
        self
    }

    /// The producer, if the default policy is one.
    pub fn default_producer(&self) -> Option<&SharedProducer> {
        match &self.default {
            DefaultValue::Producer(producer) => Some(producer),
            _ => None,
        }
    }

    /// Column name for this field when declared under `attribute`.
    pub fn column<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.column_name.as_deref().unwrap_or(attribute)
    }

    /// Copy of this field for a history table.
    ///
    /// History rows share logical ids, so the primary-key flag is dropped.
    /// Foreign keys are dropped so history outlives its referents, and
    /// producers are dropped because history values are always copied.
    pub fn to_history(&self) -> Self {
        Self {
            kind: self.kind,
            nullable: self.nullable,
            default: match &self.default {
                DefaultValue::Expression(expression) => DefaultValue::Expression(expression.clone()),
                _ => DefaultValue::None,
            },
            primary_key: false,
            column_name: self.column_name.clone(),
            references: None,
        }
    }

    /// Column definition for `CREATE TABLE`.
    pub fn to_sql(&self, attribute: &str) -> String {
        let mut parts = vec![quote_identifier(self.column(attribute)), self.kind.sql_type()];
        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let DefaultValue::Expression(expression) = &self.default {
            parts.push(format!("DEFAULT {expression}"));
        }
        if self.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if let Some(reference) = &self.references {
            parts.push(format!(
                "REFERENCES {} ({})",
                quote_identifier(&reference.table),
                quote_identifier(&reference.column)
            ));
        }
        parts.join(" ")
    }
}
