//! The public entry point: one connection, its models, procedures and ad-hoc queries.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::executor::{Connection, QueryExecutor, QueryOutcome};
use crate::factory::{ModelFactory, Names};
use crate::model::Model;
use crate::procedure::{ProcedureResult, StoredProcedureInvoker};
use crate::schema::SchemaInspector;
use crate::types::RowValues;
use crate::where_clause::WhereClause;

/// Everything this crate does, over one externally supplied connection.
///
/// ```rust,no_run
/// # #[cfg(feature = "mssql")]
/// # async fn demo() -> Result<(), sql_model::SqlModelError> {
/// use sql_model::prelude::*;
///
/// let options = MssqlOptions::from_env()?;
/// let session = Session::new(MssqlConnection::connect(&options).await?);
/// let models = session.discover_model("People", "Person").await?;
/// let people = models["Person"]
///     .find(WhereClause::new().where_eq("LastName", "Watson"), None)
///     .await?;
/// # let _ = people;
/// # Ok(())
/// # }
/// ```
pub struct Session<C> {
    executor: QueryExecutor<C>,
}

impl<C> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("executor", &self.executor)
            .finish()
    }
}

impl<C: Connection> Session<C> {
    #[must_use]
    pub fn new(conn: C) -> Self {
        Self {
            executor: QueryExecutor::new(conn),
        }
    }

    #[must_use]
    pub fn from_executor(executor: QueryExecutor<C>) -> Self {
        Self { executor }
    }

    #[must_use]
    pub fn executor(&self) -> &QueryExecutor<C> {
        &self.executor
    }

    /// Discover tables and build one model per table, keyed by model name.
    ///
    /// Pass a single table and model name, or two lists of equal length.
    ///
    /// # Errors
    ///
    /// See [`ModelFactory::discover`].
    pub async fn discover_model(
        &self,
        tables: impl Into<Names>,
        models: impl Into<Names>,
    ) -> Result<HashMap<String, Model<C>>> {
        let factory = ModelFactory::new(SchemaInspector::new(self.executor.clone()));
        let definitions = factory.discover(tables, models).await?;
        Ok(definitions
            .into_iter()
            .map(|(name, definition)| (name, Model::new(definition, self.executor.clone())))
            .collect())
    }

    /// Call a stored procedure with positional arguments.
    ///
    /// # Errors
    ///
    /// See [`StoredProcedureInvoker::call`].
    pub async fn call_procedure(
        &self,
        procedure: &str,
        args: Vec<RowValues>,
    ) -> Result<ProcedureResult> {
        StoredProcedureInvoker::new(self.executor.clone())
            .call(procedure, args)
            .await
    }

    /// Run caller-written SQL. Predicates of `where_clause` are bound as parameters named
    /// after their columns and must each carry a type; the SQL text must reference them.
    ///
    /// # Errors
    ///
    /// [`SqlModelError::Validation`](crate::SqlModelError::Validation) for an untyped
    /// predicate, otherwise the driver's error.
    pub async fn run_query(
        &self,
        sql: &str,
        where_clause: Option<&WhereClause>,
    ) -> Result<QueryOutcome> {
        let params = match where_clause {
            Some(clause) => clause.typed_parameters()?,
            None => Vec::new(),
        };
        debug!(params = params.len(), "running caller query");
        self.executor.execute(sql, &params).await
    }
}
