//! sqlx-backed transaction handle.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rowkeeper_proto::{DbRow, QueryError, QueryResult, Statement, Transaction, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, PgPool, Postgres, Row, Type, TypeInfo};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::isolation::IsolationLevel;

/// An open PostgreSQL transaction.
///
/// Dropping the handle without calling [`PgTransaction::commit`] rolls the
/// transaction back.
pub struct PgTransaction<'c> {
    inner: sqlx::Transaction<'c, Postgres>,
}

impl<'c> PgTransaction<'c> {
    /// Wrap a transaction that was started elsewhere.
    pub fn new(inner: sqlx::Transaction<'c, Postgres>) -> Self {
        Self { inner }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> Result<()> {
        self.inner.commit().await?;
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;
        Ok(())
    }

    /// Unwrap into the underlying sqlx transaction.
    pub fn into_inner(self) -> sqlx::Transaction<'c, Postgres> {
        self.inner
    }
}

/// Begin a transaction on the pool at the given isolation level.
#[instrument(skip(pool))]
pub async fn begin(pool: &PgPool, level: IsolationLevel) -> Result<PgTransaction<'static>> {
    let mut inner = pool.begin().await?;
    let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
    sqlx::query(&sql).execute(&mut *inner).await?;
    debug!("transaction started");
    Ok(PgTransaction { inner })
}

#[async_trait]
impl Transaction for PgTransaction<'_> {
    async fn query(&mut self, statement: &Statement) -> std::result::Result<QueryResult, QueryError> {
        let query = statement
            .params()
            .iter()
            .fold(sqlx::query(statement.text()), bind);

        if statement.is_query() {
            let rows = query
                .fetch_all(&mut *self.inner)
                .await
                .map_err(|e| QueryError::with_source("query failed", e))?;
            let rows = rows.iter().map(decode_row).collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(QueryResult::with_rows(rows))
        } else {
            let done = query
                .execute(&mut *self.inner)
                .await
                .map_err(|e| QueryError::with_source("statement failed", e))?;
            Ok(QueryResult::affected(done.rows_affected()))
        }
    }
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int32(v) => query.bind(*v),
        Value::Int64(v) => query.bind(*v),
        Value::Float64(v) => query.bind(*v),
        Value::String(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Timestamp(v) => query.bind(*v),
        Value::Uuid(v) => query.bind(*v),
    }
}

fn decode_row(row: &PgRow) -> std::result::Result<DbRow, QueryError> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name())?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

fn decode_column(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<Value, QueryError> {
    let value = match type_name {
        "BOOL" => get::<bool>(row, index)?.map(Value::Bool),
        "INT2" => get::<i16>(row, index)?.map(|v| Value::Int32(v.into())),
        "INT4" => get::<i32>(row, index)?.map(Value::Int32),
        "INT8" => get::<i64>(row, index)?.map(Value::Int64),
        "FLOAT4" => get::<f32>(row, index)?.map(|v| Value::Float64(v.into())),
        "FLOAT8" => get::<f64>(row, index)?.map(Value::Float64),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => get::<String>(row, index)?.map(Value::String),
        "BYTEA" => get::<Vec<u8>>(row, index)?.map(Value::Bytes),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index)?.map(Value::Timestamp),
        "TIMESTAMP" => get::<NaiveDateTime>(row, index)?.map(|v| Value::Timestamp(v.and_utc())),
        "UUID" => get::<Uuid>(row, index)?.map(Value::Uuid),
        other => {
            return Err(QueryError::new(format!(
                "unsupported column type {other} at position {index}"
            )))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> std::result::Result<Option<T>, QueryError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| QueryError::with_source(format!("cannot decode column {index}"), e))
}
