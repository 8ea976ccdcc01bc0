//! Shared fixtures for lifecycle integration tests.
//!
//! [`MemoryTransaction`] is an in-memory stand-in for a database
//! transaction. It understands exactly the statement shapes the engine
//! emits, records every statement it receives, and can be told to fail
//! statements matching a predicate.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rowkeeper_core::catalog::FieldDef;
use rowkeeper_core::proto::{DbRow, QueryError, QueryResult, Statement, Transaction, Value};
use rowkeeper_core::{HistoricScaffold, ModelSchema, Scaffold};
use tracing_subscriber::EnvFilter;

type FailurePredicate = Box<dyn Fn(&Statement) -> bool + Send>;

/// In-memory transaction handle.
#[derive(Default)]
pub struct MemoryTransaction {
    tables: HashMap<String, Vec<DbRow>>,
    statements: Vec<Statement>,
    fail_when: Option<FailurePredicate>,
}

impl MemoryTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement for which `predicate` returns true.
    pub fn fail_when(&mut self, predicate: impl Fn(&Statement) -> bool + Send + 'static) {
        self.fail_when = Some(Box::new(predicate));
    }

    /// Stop injecting failures.
    pub fn heal(&mut self) {
        self.fail_when = None;
    }

    /// Every statement received so far, including failed ones.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Texts of the statements received so far.
    pub fn texts(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.text().to_string()).collect()
    }

    /// Forget recorded statements.
    pub fn clear_log(&mut self) {
        self.statements.clear();
    }

    /// Stored rows of a table.
    pub fn rows(&self, table: &str) -> &[DbRow] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn execute(&mut self, statement: &Statement) -> Result<QueryResult, String> {
        let text = statement.text();
        let params = statement.params();

        if text.starts_with("CREATE ") {
            let table = identifiers(text).into_iter().next().ok_or("missing table")?;
            self.tables.entry(table).or_default();
            return Ok(QueryResult::affected(0));
        }

        if let Some(rest) = text.strip_prefix("SELECT count(*) FROM ") {
            let (table, column, value) = parse_where(rest, params)?;
            let count = self
                .rows(&table)
                .iter()
                .filter(|row| row.get(&column) == Some(&value))
                .count();
            let mut row = DbRow::new();
            row.insert("count".to_string(), Value::Int64(count as i64));
            return Ok(QueryResult::with_rows(vec![row]));
        }

        if let Some(rest) = text.strip_prefix("SELECT * FROM ") {
            let (head, order) = match rest.split_once(" ORDER BY ") {
                Some((head, order)) => (head, Some(order)),
                None => (rest, None),
            };
            let (table, column, value) = parse_where(head, params)?;
            let matching: Vec<DbRow> = self
                .rows(&table)
                .iter()
                .filter(|row| row.get(&column) == Some(&value))
                .cloned()
                .collect();

            let rows = match order {
                Some(order) => {
                    if !order.ends_with(" DESC LIMIT 1") {
                        return Err(format!("unsupported ordering: {order}"));
                    }
                    let key = unquote(order.trim_end_matches(" DESC LIMIT 1"));
                    matching
                        .into_iter()
                        .max_by_key(|row| row.get(&key).and_then(Value::as_timestamp))
                        .into_iter()
                        .collect()
                }
                None => matching,
            };
            return Ok(QueryResult::with_rows(rows));
        }

        if let Some(rest) = text.strip_prefix("INSERT INTO ") {
            let table = identifiers(rest).into_iter().next().ok_or("missing table")?;
            let mut row = DbRow::new();
            if !rest.ends_with(" DEFAULT VALUES") {
                let (columns, values) = rest
                    .split_once(" VALUES (")
                    .ok_or("malformed INSERT")?;
                let columns: Vec<String> = identifiers(columns).into_iter().skip(1).collect();
                let values: Vec<&str> = values.trim_end_matches(')').split(", ").collect();
                if columns.len() != values.len() {
                    return Err("column/value count mismatch".to_string());
                }
                for (column, token) in columns.into_iter().zip(values) {
                    row.insert(column, bound(params, token)?);
                }
            }
            self.tables.entry(table).or_default().push(row);
            return Ok(QueryResult::affected(1));
        }

        if let Some(rest) = text.strip_prefix("UPDATE ") {
            let (head, filter) = rest.split_once(" WHERE ").ok_or("missing WHERE")?;
            let (table, assignments) = head.split_once(" SET ").ok_or("missing SET")?;
            let table = unquote(table);
            let (column, value) = parse_condition(filter, params)?;

            let mut changes = Vec::new();
            for assignment in assignments.split(", ") {
                let (target, token) = assignment.split_once(" = ").ok_or("malformed SET")?;
                changes.push((unquote(target), bound(params, token)?));
            }

            let mut updated = 0;
            for row in self.tables.entry(table).or_default() {
                if row.get(&column) == Some(&value) {
                    for (target, new_value) in &changes {
                        row.insert(target.clone(), new_value.clone());
                    }
                    updated += 1;
                }
            }
            return Ok(QueryResult::affected(updated));
        }

        if let Some(rest) = text.strip_prefix("DELETE FROM ") {
            let (table, column, value) = parse_where(rest, params)?;
            let rows = self.tables.entry(table).or_default();
            let before = rows.len();
            rows.retain(|row| row.get(&column) != Some(&value));
            return Ok(QueryResult::affected((before - rows.len()) as u64));
        }

        Err(format!("unsupported statement: {text}"))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult, QueryError> {
        self.statements.push(statement.clone());
        if self.fail_when.as_ref().is_some_and(|fail| fail(statement)) {
            return Err(QueryError::new("injected failure"));
        }
        self.execute(statement).map_err(QueryError::new)
    }
}

/// Quoted identifiers in order of appearance.
fn identifiers(text: &str) -> Vec<String> {
    text.split('"')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, ident)| ident.to_string())
        .collect()
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}

/// `"table" WHERE "column" = <token>`
fn parse_where(text: &str, params: &[Value]) -> Result<(String, String, Value), String> {
    let (table, filter) = text.split_once(" WHERE ").ok_or("missing WHERE")?;
    let (column, value) = parse_condition(filter, params)?;
    Ok((unquote(table), column, value))
}

fn parse_condition(text: &str, params: &[Value]) -> Result<(String, Value), String> {
    let (column, token) = text.split_once(" = ").ok_or("malformed condition")?;
    Ok((unquote(column), bound(params, token)?))
}

fn bound(params: &[Value], token: &str) -> Result<Value, String> {
    let token = token.trim();
    if token == "NULL" {
        return Ok(Value::Null);
    }
    let index: usize = token
        .strip_prefix('$')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| format!("unexpected token {token}"))?;
    params
        .get(index - 1)
        .cloned()
        .ok_or_else(|| format!("missing parameter {token}"))
}

/// Install a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `Widget { id, name, updated_at, created_at }`.
pub fn widget_schema() -> Arc<ModelSchema> {
    Arc::new(
        ModelSchema::scaffold("Widget")
            .field("name", FieldDef::varchar())
            .field("note", FieldDef::text().nullable())
            .build()
            .expect("widget schema"),
    )
}

pub fn widget_scaffold() -> Scaffold {
    Scaffold::new(widget_schema()).expect("widget scaffold")
}

pub fn widget_history() -> HistoricScaffold {
    HistoricScaffold::new(widget_schema()).expect("widget history")
}
