//! Default-value producers.
//!
//! A producer is invoked during save for every field that is still unset,
//! in declaration order, and may await I/O.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rowkeeper_proto::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::model::Row;

/// Capability to produce a default value for an unset field.
#[async_trait]
pub trait DefaultProducer: fmt::Debug + Send + Sync {
    /// Produce a value given the row being saved.
    async fn produce(&self, row: &Row) -> Result<Value>;
}

/// Produces a random (v4) UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateUuid;

#[async_trait]
impl DefaultProducer for GenerateUuid {
    async fn produce(&self, _row: &Row) -> Result<Value> {
        Ok(Value::Uuid(Uuid::new_v4()))
    }
}

/// Produces the current instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimestamp;

#[async_trait]
impl DefaultProducer for CurrentTimestamp {
    async fn produce(&self, _row: &Row) -> Result<Value> {
        Ok(Value::Timestamp(Utc::now()))
    }
}

/// Produces a value from a synchronous closure.
pub struct FnProducer<F> {
    name: &'static str,
    f: F,
}

impl<F> FnProducer<F>
where
    F: Fn(&Row) -> Result<Value> + Send + Sync,
{
    /// Wrap a closure; `name` only shows up in debug output.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnProducer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProducer").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> DefaultProducer for FnProducer<F>
where
    F: Fn(&Row) -> Result<Value> + Send + Sync,
{
    async fn produce(&self, row: &Row) -> Result<Value> {
        (self.f)(row)
    }
}

/// Shared handle to a producer.
pub type SharedProducer = Arc<dyn DefaultProducer>;
