//! Parameterized SQL statements.
//!
//! Statements carry their SQL text with positional placeholders (`$1`,
//! `$2`, ...) and the values bound to them, in order. SQL NULL is written
//! inline as `NULL` rather than bound, so drivers never need to guess the
//! type of an untyped null parameter.

use std::fmt;

use crate::value::Value;

/// Quote an SQL identifier, doubling any embedded double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// An SQL statement with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: Vec<Value>,
}

impl Statement {
    /// Create a statement with no bound parameters.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// SQL text with positional placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound parameters, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Split into text and parameters.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.params)
    }

    /// Whether the statement reads rows (as opposed to modifying them).
    pub fn is_query(&self) -> bool {
        let head = self.text.trim_start();
        head.get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Incremental builder for [`Statement`].
#[derive(Debug, Default)]
pub struct StatementBuilder {
    text: String,
    params: Vec<Value>,
}

impl StatementBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        self.text.push_str(&quote_identifier(name));
        self
    }

    /// Bind a value, appending its placeholder.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        if value.is_null() {
            self.text.push_str("NULL");
        } else {
            self.params.push(value);
            self.text.push('$');
            self.text.push_str(&self.params.len().to_string());
        }
        self
    }

    /// Append items separated by `separator`, rendering each with `f`.
    pub fn push_separated<I, F>(&mut self, items: I, separator: &str, mut f: F) -> &mut Self
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.text.push_str(separator);
            }
            f(self, item);
        }
        self
    }

    /// Finish the statement.
    pub fn build(self) -> Statement {
        Statement {
            text: self.text,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("Widget"), "\"Widget\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_builder_numbers_placeholders() {
        let mut builder = StatementBuilder::new();
        builder
            .push("UPDATE ")
            .push_identifier("t")
            .push(" SET ")
            .push_separated(
                [("a", Value::Int32(1)), ("b", Value::from("x"))],
                ", ",
                |b, (column, value)| {
                    b.push_identifier(column).push(" = ").push_bind(value);
                },
            )
            .push(" WHERE ")
            .push_identifier("id")
            .push(" = ")
            .push_bind(Value::Int64(7));
        let statement = builder.build();

        assert_eq!(
            statement.text(),
            "UPDATE \"t\" SET \"a\" = $1, \"b\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(statement.params().len(), 3);
        assert!(!statement.is_query());
    }

    #[test]
    fn test_null_is_inlined() {
        let mut builder = StatementBuilder::new();
        builder
            .push("VALUES (")
            .push_bind(Value::Null)
            .push(", ")
            .push_bind(Value::Bool(true))
            .push(")");
        let statement = builder.build();

        assert_eq!(statement.text(), "VALUES (NULL, $1)");
        assert_eq!(statement.params(), &[Value::Bool(true)]);
    }

    #[test]
    fn test_is_query() {
        assert!(Statement::raw("SELECT * FROM \"t\"").is_query());
        assert!(Statement::raw("  select count(*) FROM \"t\"").is_query());
        assert!(!Statement::raw("DELETE FROM \"t\"").is_query());
        assert!(!Statement::raw("SET").is_query());
    }

    #[test]
    fn test_is_query_multibyte_text() {
        assert!(!Statement::raw("aéééé").is_query());
        assert!(!Statement::raw("é").is_query());
        assert!(Statement::raw("select 'é'").is_query());
    }
}
