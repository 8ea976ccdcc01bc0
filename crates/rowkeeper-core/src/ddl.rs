//! DDL compiler.
//!
//! Turns a [`ModelSchema`] into its `CREATE TABLE` statement. Fields are
//! emitted before constraints, each group in declaration order.

use rowkeeper_proto::{quote_identifier, Statement};
use serde_json::Value as JsonValue;

use crate::catalog::{ConfigError, ModelSchema};

/// Table creation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Emit `TEMPORARY`.
    pub temporary: bool,
    /// Emit `UNLOGGED`.
    pub unlogged: bool,
    /// Emit `IF NOT EXISTS`.
    pub if_not_exists: bool,
}

impl TableOptions {
    /// Options with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `TEMPORARY` flag.
    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Set the `UNLOGGED` flag.
    pub fn with_unlogged(mut self, unlogged: bool) -> Self {
        self.unlogged = unlogged;
        self
    }

    /// Set the `IF NOT EXISTS` flag.
    pub fn with_if_not_exists(mut self, if_not_exists: bool) -> Self {
        self.if_not_exists = if_not_exists;
        self
    }

    /// Parse options from a JSON object.
    ///
    /// Accepts `temporary`, `unlogged`, and `ifNotExists` (or
    /// `if_not_exists`) keys; missing keys default to false and `null`
    /// means no options at all.
    pub fn from_json(value: &JsonValue) -> Result<Self, ConfigError> {
        let object = match value {
            JsonValue::Null => return Ok(Self::default()),
            JsonValue::Object(object) => object,
            _ => {
                return Err(ConfigError::InvalidArguments(
                    "options must be an object".to_string(),
                ))
            }
        };

        let mut options = Self::default();
        for (key, value) in object {
            let slot = match key.as_str() {
                "temporary" => &mut options.temporary,
                "unlogged" => &mut options.unlogged,
                "ifNotExists" | "if_not_exists" => &mut options.if_not_exists,
                _ => {
                    return Err(ConfigError::InvalidArguments(format!(
                        "unknown option {key}"
                    )))
                }
            };
            *slot = value.as_bool().ok_or_else(|| {
                ConfigError::InvalidArguments(format!("{key} must be a boolean"))
            })?;
        }
        Ok(options)
    }
}

/// Compile the `CREATE TABLE` statement for a schema.
pub fn compile(schema: &ModelSchema, options: &TableOptions) -> Statement {
    let columns: Vec<String> = schema
        .fields()
        .map(|(attribute, field)| field.to_sql(attribute))
        .collect();
    let constraints: Vec<String> = schema
        .constraints()
        .map(|(attribute, constraint)| constraint.to_sql(Some(attribute)))
        .collect();

    let body = join_non_empty([columns.join(", "), constraints.join(", ")], ", ");

    let text = join_non_empty(
        [
            "CREATE".to_string(),
            flag(options.temporary, "TEMPORARY"),
            flag(options.unlogged, "UNLOGGED"),
            "TABLE".to_string(),
            flag(options.if_not_exists, "IF NOT EXISTS"),
            format!("{} (", quote_identifier(schema.table_name())),
            body,
            ")".to_string(),
        ],
        " ",
    );
    Statement::raw(text)
}

fn flag(enabled: bool, keyword: &str) -> String {
    if enabled {
        keyword.to_string()
    } else {
        String::new()
    }
}

fn join_non_empty(parts: impl IntoIterator<Item = String>, separator: &str) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConstraintArgs, ConstraintDef, FieldDef};

    #[test]
    fn test_empty_schema() {
        let schema = ModelSchema::builder("Test").build().unwrap();
        let statement = compile(&schema, &TableOptions::default());
        assert_eq!(statement.text(), "CREATE TABLE \"Test\" ( )");
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_all_flags() {
        let schema = ModelSchema::builder("Test").build().unwrap();
        let options = TableOptions::new()
            .with_temporary(true)
            .with_unlogged(true)
            .with_if_not_exists(true);
        assert_eq!(
            compile(&schema, &options).text(),
            "CREATE TEMPORARY UNLOGGED TABLE IF NOT EXISTS \"Test\" ( )"
        );
    }

    #[test]
    fn test_fields_then_constraints() {
        let schema = ModelSchema::builder("Test")
            .constraint("dummy2", ConstraintDef::check("dummy").unwrap())
            .field("dummy", FieldDef::varchar())
            .build()
            .unwrap();
        let options = TableOptions::new().with_if_not_exists(true);

        assert_eq!(
            compile(&schema, &options).text(),
            "CREATE TABLE IF NOT EXISTS \"Test\" ( \"dummy\" varchar(255) NOT NULL, \
             CONSTRAINT \"dummy2\" CHECK ( dummy ) )"
        );
    }

    #[test]
    fn test_constraints_only() {
        let named = ConstraintDef::new(ConstraintArgs {
            name: Some("explicit".into()),
            unique: Some(vec!["a".into()]),
            ..Default::default()
        })
        .unwrap();
        let schema = ModelSchema::builder("Test")
            .constraint("ignored", named)
            .constraint("pk", ConstraintDef::primary_key(["a"]).unwrap())
            .build()
            .unwrap();

        assert_eq!(
            compile(&schema, &TableOptions::default()).text(),
            "CREATE TABLE \"Test\" ( CONSTRAINT \"explicit\" UNIQUE ( \"a\" ), \
             CONSTRAINT \"pk\" PRIMARY KEY ( \"a\" ) )"
        );
    }

    #[test]
    fn test_scaffold_table() {
        let schema = ModelSchema::scaffold("Widget")
            .table_name("widgets")
            .field("name", FieldDef::varchar())
            .build()
            .unwrap();

        assert_eq!(
            compile(&schema, &TableOptions::default()).text(),
            "CREATE TABLE \"widgets\" ( \"id\" uuid NOT NULL PRIMARY KEY, \
             \"name\" varchar(255) NOT NULL, \"updated_at\" timestamptz NOT NULL, \
             \"created_at\" timestamptz NOT NULL )"
        );
    }

    #[test]
    fn test_options_from_json() {
        let options =
            TableOptions::from_json(&serde_json::json!({"temporary": true, "ifNotExists": true}))
                .unwrap();
        assert!(options.temporary);
        assert!(!options.unlogged);
        assert!(options.if_not_exists);

        assert_eq!(
            TableOptions::from_json(&JsonValue::Null).unwrap(),
            TableOptions::default()
        );

        let err = TableOptions::from_json(&serde_json::json!({"temporary": "yes"})).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidArguments("temporary must be a boolean".to_string())
        );

        let err = TableOptions::from_json(&serde_json::json!([true])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidArguments("options must be an object".to_string())
        );

        assert!(TableOptions::from_json(&serde_json::json!({"logged": false})).is_err());
    }
}
