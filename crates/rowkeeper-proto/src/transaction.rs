//! The transaction handle contract.

use async_trait::async_trait;

use crate::error::QueryError;
use crate::result::QueryResult;
use crate::statement::Statement;

/// A caller-supplied transaction that executes statements in order.
///
/// Implementations own isolation, cancellation, and timeouts. The engine
/// issues every statement sequentially and awaits each one before the next.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a statement and return the rows it produced.
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult, QueryError>;
}

#[async_trait]
impl<T: Transaction + ?Sized> Transaction for &mut T {
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult, QueryError> {
        (**self).query(statement).await
    }
}

#[async_trait]
impl<T: Transaction + ?Sized> Transaction for Box<T> {
    async fn query(&mut self, statement: &Statement) -> Result<QueryResult, QueryError> {
        (**self).query(statement).await
    }
}
