use async_trait::async_trait;

use crate::error::Result;
use crate::params::{BoundParameter, ParamDecl};
use crate::results::ResultSet;
use crate::types::RowValues;

/// Server-side handle of a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub i32);

/// Everything one round trip produced.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub result_sets: Vec<ResultSet>,
    pub rows_affected: usize,
}

impl QueryOutput {
    #[must_use]
    pub fn rows(result_set: ResultSet) -> Self {
        Self {
            result_sets: vec![result_set],
            rows_affected: 0,
        }
    }

    #[must_use]
    pub fn affected(rows_affected: usize) -> Self {
        Self {
            result_sets: Vec::new(),
            rows_affected,
        }
    }
}

/// Result sets and the integer return status of a stored procedure call.
#[derive(Debug, Clone, Default)]
pub struct ProcedureOutput {
    pub result_sets: Vec<ResultSet>,
    pub return_value: Option<i64>,
}

/// The database client this crate drives.
///
/// One value is one connection (or a connection with an open transaction). Implementations
/// are never shared between concurrent statements: [`QueryExecutor`](super::QueryExecutor)
/// holds them behind a mutex for the full duration of every operation.
#[async_trait]
pub trait Connection: Send {
    /// Run SQL text with no parameters.
    async fn simple_query(&mut self, sql: &str) -> Result<QueryOutput>;

    /// Prepare `sql` with the declared inputs, returning the server handle.
    async fn prepare(&mut self, sql: &str, inputs: &[ParamDecl]) -> Result<StatementHandle>;

    /// Execute a prepared statement. `values` are in the order the inputs were declared.
    async fn execute_prepared(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<QueryOutput>;

    /// Release a prepared statement.
    async fn unprepare(&mut self, handle: StatementHandle) -> Result<()>;

    /// Execute a stored procedure with named, typed arguments.
    async fn execute_procedure(
        &mut self,
        name: &str,
        params: &[BoundParameter],
    ) -> Result<ProcedureOutput>;
}
