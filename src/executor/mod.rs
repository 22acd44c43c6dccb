//! Statement execution against one shared connection.

mod connection;
mod prepared;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

pub use connection::{Connection, ProcedureOutput, QueryOutput, StatementHandle};
pub use prepared::{PreparedStatement, StatementState, run_prepared};

use crate::error::Result;
use crate::params::BoundParameter;
use crate::results::ResultSet;

/// What a statement produced: rows when any came back, otherwise the affected-row count.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Rows(ResultSet),
    RowsAffected(usize),
}

impl QueryOutcome {
    /// Rows of the outcome; an affected-row count yields an empty set.
    #[must_use]
    pub fn into_rows(self) -> ResultSet {
        match self {
            QueryOutcome::Rows(rs) => rs,
            QueryOutcome::RowsAffected(_) => ResultSet::default(),
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<usize> {
        match self {
            QueryOutcome::Rows(_) => None,
            QueryOutcome::RowsAffected(n) => Some(*n),
        }
    }
}

impl From<QueryOutput> for QueryOutcome {
    fn from(output: QueryOutput) -> Self {
        match output.result_sets.into_iter().find(|rs| !rs.is_empty()) {
            Some(rows) => QueryOutcome::Rows(rows),
            None => QueryOutcome::RowsAffected(output.rows_affected),
        }
    }
}

/// Runs statements on one connection, one operation at a time.
///
/// Clones share the connection. Each call holds the connection lock from its first protocol
/// step to its last, so prepare/execute/unprepare sequences issued concurrently through
/// clones never interleave.
pub struct QueryExecutor<C> {
    conn: Arc<Mutex<C>>,
}

impl<C> Clone for QueryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl<C> std::fmt::Debug for QueryExecutor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("conn", &"<Connection>")
            .finish()
    }
}

impl<C: Connection> QueryExecutor<C> {
    #[must_use]
    pub fn new(conn: C) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `sql`, through the prepared-statement protocol when `params` is non-empty.
    ///
    /// # Errors
    ///
    /// Returns the driver's error for whichever step failed.
    pub async fn execute(&self, sql: &str, params: &[BoundParameter]) -> Result<QueryOutcome> {
        let mut conn = self.conn.lock().await;
        debug!(sql, params = ?params, "executing");

        let output = if params.is_empty() {
            conn.simple_query(sql).await?
        } else {
            let inputs: Vec<_> = params
                .iter()
                .map(|p| (p.name.as_str(), p.native_type, &p.value))
                .collect();
            run_prepared(&mut *conn, sql, &inputs).await?
        };
        Ok(output.into())
    }

    /// Execute a stored procedure under the connection lock.
    ///
    /// # Errors
    ///
    /// Returns the driver's error.
    pub async fn call_procedure(
        &self,
        name: &str,
        params: &[BoundParameter],
    ) -> Result<ProcedureOutput> {
        let mut conn = self.conn.lock().await;
        debug!(procedure = name, params = ?params, "calling procedure");
        conn.execute_procedure(name, params).await
    }

    /// Take the connection back once every clone of this executor is gone.
    pub fn into_inner(self) -> Option<C> {
        Arc::try_unwrap(self.conn).ok().map(Mutex::into_inner)
    }
}
