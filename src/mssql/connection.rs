use std::collections::HashMap;

use async_trait::async_trait;
use tiberius::Query;
use tracing::{debug, trace};

use super::client::{MssqlClient, create_mssql_client};
use super::config::MssqlOptions;
use super::query::{
    HANDLE_COLUMN, RETURN_VALUE_COLUMN, ROWS_AFFECTED_COLUMN, TextBatch, UNPREPARE_BATCH,
    bind_value, collect_result_sets, execute_batch, procedure_batch, take_trailing_int,
};
use crate::error::{Result, SqlModelError};
use crate::executor::{Connection, ProcedureOutput, QueryOutput, StatementHandle};
use crate::native_type::NativeType;
use crate::params::{BoundParameter, ParamDecl};
use crate::results::ResultSet;
use crate::types::RowValues;

/// One SQL Server connection driving the `sp_prepare` / `sp_execute` / `sp_unprepare`
/// protocol.
pub struct MssqlConnection {
    client: MssqlClient,
    // declared input types per live handle, used to type NULL arguments
    prepared: HashMap<i32, Vec<NativeType>>,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("prepared", &self.prepared.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MssqlConnection {
    /// Connect with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Connection`] if the server cannot be reached or refuses the
    /// login.
    pub async fn connect(options: &MssqlOptions) -> Result<Self> {
        Ok(Self::from_client(create_mssql_client(options).await?))
    }

    /// Wrap a client the caller already opened.
    #[must_use]
    pub fn from_client(client: MssqlClient) -> Self {
        Self {
            client,
            prepared: HashMap::new(),
        }
    }

    #[must_use]
    pub fn into_client(self) -> MssqlClient {
        self.client
    }

    async fn run(&mut self, query: Query<'_>) -> Result<Vec<ResultSet>> {
        let stream = query.query(&mut self.client).await?;
        collect_result_sets(stream).await
    }
}

fn output_with_row_count(mut sets: Vec<ResultSet>) -> Result<QueryOutput> {
    let affected = take_trailing_int(&mut sets, ROWS_AFFECTED_COLUMN)?.unwrap_or(0);
    Ok(QueryOutput {
        result_sets: sets,
        rows_affected: usize::try_from(affected).unwrap_or(0),
    })
}

/// Forget the declared types of `handle`, then run the server-side release. The entry is
/// dropped even when the release fails.
async fn release_handle<F>(
    prepared: &mut HashMap<i32, Vec<NativeType>>,
    handle: StatementHandle,
    release: F,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    prepared.remove(&handle.0);
    release.await
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn simple_query(&mut self, sql: &str) -> Result<QueryOutput> {
        let query = TextBatch::simple(sql).into_query();
        output_with_row_count(self.run(query).await?)
    }

    async fn prepare(&mut self, sql: &str, inputs: &[ParamDecl]) -> Result<StatementHandle> {
        let query = TextBatch::prepare(sql, inputs).into_query();
        let mut sets = self.run(query).await?;

        let handle = take_trailing_int(&mut sets, HANDLE_COLUMN)?
            .and_then(|h| i32::try_from(h).ok())
            .ok_or_else(|| SqlModelError::database("sp_prepare returned no handle"))?;
        self.prepared
            .insert(handle, inputs.iter().map(|d| d.native_type).collect());
        trace!(handle, "prepared");
        Ok(StatementHandle(handle))
    }

    async fn execute_prepared(
        &mut self,
        handle: StatementHandle,
        values: &[RowValues],
    ) -> Result<QueryOutput> {
        let sql = execute_batch(values.len());
        let mut query = Query::new(sql);
        query.bind(handle.0);
        let types = self.prepared.get(&handle.0).cloned().unwrap_or_default();
        for (i, value) in values.iter().enumerate() {
            bind_value(&mut query, value, types.get(i).copied());
        }
        output_with_row_count(self.run(query).await?)
    }

    async fn unprepare(&mut self, handle: StatementHandle) -> Result<()> {
        let mut query = Query::new(UNPREPARE_BATCH);
        query.bind(handle.0);
        let client = &mut self.client;
        release_handle(&mut self.prepared, handle, async move {
            query.execute(client).await?;
            Ok::<(), SqlModelError>(())
        })
        .await?;
        trace!(handle = handle.0, "unprepared");
        Ok(())
    }

    async fn execute_procedure(
        &mut self,
        name: &str,
        params: &[BoundParameter],
    ) -> Result<ProcedureOutput> {
        let sql = procedure_batch(name, params)?;
        let mut query = Query::new(sql);
        for param in params {
            bind_value(&mut query, &param.value, Some(param.native_type));
        }
        let mut sets = self.run(query).await?;
        let return_value = take_trailing_int(&mut sets, RETURN_VALUE_COLUMN)?;
        debug!(procedure = name, result_sets = sets.len(), ?return_value, "procedure returned");
        Ok(ProcedureOutput {
            result_sets: sets,
            return_value,
        })
    }
}
