//! A scripted, recording [`Connection`] for exercising the crate without a server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Result, SqlModelError};
use crate::executor::{Connection, ProcedureOutput, QueryOutput, StatementHandle};
use crate::params::{BoundParameter, ParamDecl};
use crate::results::ResultSet;
use crate::types::RowValues;

/// One protocol step as the mock saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SimpleQuery(String),
    Prepare { sql: String, inputs: Vec<ParamDecl> },
    Execute { handle: StatementHandle, values: Vec<RowValues> },
    Unprepare(StatementHandle),
    Procedure { name: String, params: Vec<BoundParameter> },
}

/// What the next statement (simple, prepared, or procedure) returns.
#[derive(Debug, Clone)]
pub enum Scripted {
    Query(QueryOutput),
    Procedure(ProcedureOutput),
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    responses: VecDeque<Scripted>,
    next_handle: i32,
    fail_next_unprepare: Option<String>,
}

/// Records every call and replays queued responses in order. Clones share state, so a
/// test can keep one clone to inspect what the crate sent.
///
/// Statements with nothing queued return no rows and no affected rows.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panicking test poisons the lock; the state is still readable
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push(&self, response: Scripted) -> &Self {
        self.state().responses.push_back(response);
        self
    }

    pub fn push_rows(&self, rows: ResultSet) -> &Self {
        self.push(Scripted::Query(QueryOutput::rows(rows)))
    }

    pub fn push_affected(&self, rows_affected: usize) -> &Self {
        self.push(Scripted::Query(QueryOutput::affected(rows_affected)))
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.push(Scripted::Error(message.into()))
    }

    pub fn push_procedure(&self, result_sets: Vec<ResultSet>, return_value: Option<i64>) -> &Self {
        self.push(Scripted::Procedure(ProcedureOutput {
            result_sets,
            return_value,
        }))
    }

    /// Make the next `unprepare` fail with `message`.
    pub fn fail_next_unprepare(&self, message: impl Into<String>) -> &Self {
        self.state().fail_next_unprepare = Some(message.into());
        self
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// SQL text of every simple query and prepare, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SimpleQuery(sql) | Call::Prepare { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn remaining_responses(&self) -> usize {
        self.state().responses.len()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn next_query(&self) -> Result<QueryOutput> {
        match self.state().responses.pop_front() {
            None => Ok(QueryOutput::default()),
            Some(Scripted::Query(output)) => Ok(output),
            Some(Scripted::Error(message)) => Err(SqlModelError::Database(message)),
            Some(Scripted::Procedure(_)) => Err(SqlModelError::Database(
                "mock: procedure response queued for a statement".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn simple_query(&mut self, sql: &str) -> Result<QueryOutput> {
        self.record(Call::SimpleQuery(sql.to_string()));
        tokio::task::yield_now().await;
        self.next_query()
    }

    async fn prepare(&mut self, sql: &str, inputs: &[ParamDecl]) -> Result<StatementHandle> {
        let handle = {
            let mut state = self.state();
            state.next_handle += 1;
            state.calls.push(Call::Prepare {
                sql: sql.to_string(),
                inputs: inputs.to_vec(),
            });
            StatementHandle(state.next_handle)
        };
        tokio::task::yield_now().await;
        Ok(handle)
    }

    async fn execute_prepared(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<QueryOutput> {
        self.record(Call::Execute {
            handle,
            values: values.to_vec(),
        });
        tokio::task::yield_now().await;
        self.next_query()
    }

    async fn unprepare(&mut self, handle: StatementHandle) -> Result<()> {
        self.record(Call::Unprepare(handle));
        tokio::task::yield_now().await;
        match self.state().fail_next_unprepare.take() {
            Some(message) => Err(SqlModelError::Database(message)),
            None => Ok(()),
        }
    }

    async fn execute_procedure(
        &mut self,
        name: &str,
        params: &[BoundParameter],
    ) -> Result<ProcedureOutput> {
        self.record(Call::Procedure {
            name: name.to_string(),
            params: params.to_vec(),
        });
        tokio::task::yield_now().await;
        match self.state().responses.pop_front() {
            None => Ok(ProcedureOutput::default()),
            Some(Scripted::Procedure(output)) => Ok(output),
            Some(Scripted::Query(output)) => Ok(ProcedureOutput {
                result_sets: output.result_sets,
                return_value: None,
            }),
            Some(Scripted::Error(message)) => Err(SqlModelError::Database(message)),
        }
    }
}

/// A result set with the given columns and rows.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|c| (*c).to_string()).collect()));
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}

/// One row of the column catalog query, for scripting discovery.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    schema: String,
    table: String,
    column: String,
    data_type: String,
    length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
    nullable: bool,
    constraint: Option<String>,
}

impl CatalogRow {
    #[must_use]
    pub fn new(table: &str, column: &str, data_type: &str) -> Self {
        Self {
            schema: "dbo".to_string(),
            table: table.to_string(),
            column: column.to_string(),
            data_type: data_type.to_string(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            constraint: None,
        }
    }

    /// Place the table in `schema` instead of `dbo`.
    #[must_use]
    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    #[must_use]
    pub fn length(mut self, length: i64) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: i64, scale: i64) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.constraint = Some("PRIMARY KEY".to_string());
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint_type: &str) -> Self {
        self.constraint = Some(constraint_type.to_string());
        self
    }
}

/// The catalog query's result set for `rows`, numbering ordinals per table. A column
/// listed twice (one row per constraint) keeps its first ordinal.
#[must_use]
pub fn catalog_set(rows: &[CatalogRow]) -> ResultSet {
    let mut seen: Vec<((&str, &str), &str, i64)> = Vec::new();
    let values = rows
        .iter()
        .map(|row| {
            let table = (row.schema.as_str(), row.table.as_str());
            let ordinal = match seen
                .iter()
                .find(|(t, c, _)| *t == table && *c == row.column)
            {
                Some((_, _, n)) => *n,
                None => {
                    let n = 1 + seen.iter().filter(|(t, _, _)| *t == table).count();
                    let n = i64::try_from(n).unwrap_or(i64::MAX);
                    seen.push((table, row.column.as_str(), n));
                    n
                }
            };
            vec![
                RowValues::from(row.schema.as_str()),
                RowValues::from(row.table.as_str()),
                RowValues::from(row.column.as_str()),
                RowValues::from(row.data_type.as_str()),
                RowValues::from(row.length),
                RowValues::from(row.precision),
                RowValues::from(row.scale),
                RowValues::Int(ordinal),
                RowValues::from(if row.nullable { "YES" } else { "NO" }),
                RowValues::from(row.constraint.clone()),
            ]
        })
        .collect();
    result_set(
        &[
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "COLUMN_NAME",
            "DATA_TYPE",
            "CHARACTER_MAXIMUM_LENGTH",
            "NUMERIC_PRECISION",
            "NUMERIC_SCALE",
            "ORDINAL_POSITION",
            "IS_NULLABLE",
            "CONSTRAINT_TYPE",
        ],
        values,
    )
}
