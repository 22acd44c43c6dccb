use std::sync::Arc;

use tracing::{debug, warn};

use super::definition::ModelDefinition;
use super::record::Record;
use super::{DEFAULT_FIND_LIMIT, sql};
use crate::error::{Result, SqlModelError};
use crate::executor::{Connection, QueryExecutor, QueryOutcome};
use crate::native_type::NativeType;
use crate::types::RowValues;
use crate::where_clause::{self, WhereClause};

/// Find / save / delete for the records of one model, over a shared connection.
pub struct Model<C> {
    definition: Arc<ModelDefinition>,
    executor: QueryExecutor<C>,
}

impl<C> Clone for Model<C> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            executor: self.executor.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Model<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Model<C> {
    #[must_use]
    pub fn new(definition: Arc<ModelDefinition>, executor: QueryExecutor<C>) -> Self {
        Self {
            definition,
            executor,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    /// An empty record of this model; every field starts `Null`.
    #[must_use]
    pub fn new_record(&self) -> Record {
        self.definition.new_record()
    }

    /// Select up to `limit` records matching `where_clause` ([`DEFAULT_FIND_LIMIT`] when
    /// `None`).
    ///
    /// # Errors
    ///
    /// [`SqlModelError::Validation`] for a predicate on a column the schema lacks, raised
    /// before any query; otherwise the driver's error.
    pub async fn find(
        &self,
        mut where_clause: WhereClause,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let schema = self.definition.schema();
        where_clause.fill_types(schema);
        where_clause::validate(&where_clause, schema)?;
        let params = where_clause::to_bound_parameters(&where_clause, schema)?;

        let limit = limit.unwrap_or(DEFAULT_FIND_LIMIT);
        let statement = sql::select_sql(schema, &where_clause, limit);
        let rows = self.executor.execute(&statement, &params).await?.into_rows();

        Ok(rows
            .iter()
            .map(|row| Record::hydrate(Arc::clone(&self.definition), row))
            .collect())
    }

    /// [`find`](Self::find) with the default limit.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub async fn find_all(&self, where_clause: WhereClause) -> Result<Vec<Record>> {
        self.find(where_clause, None).await
    }

    /// Insert the record when its key is `Null`, otherwise update it.
    ///
    /// After an insert the generated identity is stored in the record's key field.
    ///
    /// # Errors
    ///
    /// [`SqlModelError::Validation`] when the record belongs to another model; otherwise the
    /// driver's error.
    pub async fn save<'r>(&self, record: &'r mut Record) -> Result<&'r mut Record> {
        self.check_owner(record)?;
        let schema = self.definition.schema();

        if record.is_new() {
            let statement = sql::insert_sql(schema);
            let params = sql::write_params(record);
            let outcome = self.executor.execute(&statement, &params).await?;

            if let Some(pk) = schema.primary_key() {
                let identity = match outcome {
                    QueryOutcome::Rows(rows) => rows
                        .results
                        .first()
                        .and_then(|row| row.get(pk.name()))
                        .cloned()
                        .unwrap_or(RowValues::Null),
                    QueryOutcome::RowsAffected(_) => RowValues::Null,
                };
                if identity.is_null() {
                    warn!(
                        model = self.definition.model_name(),
                        "insert returned no identity; key left unset"
                    );
                }
                record.set_primary_key(coerce_identity(identity, pk.native_type));
            }
            debug!(model = self.definition.model_name(), "record inserted");
        } else {
            let Some(statement) = sql::update_sql(schema) else {
                debug!(
                    model = self.definition.model_name(),
                    "no fields besides the key; nothing to update"
                );
                return Ok(record);
            };
            let mut params = sql::write_params(record);
            params.push(sql::key_param(record)?);
            self.executor.execute(&statement, &params).await?;
            debug!(model = self.definition.model_name(), "record updated");
        }
        Ok(record)
    }

    /// Delete the record's row and clear its key. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// [`SqlModelError::MissingPrimaryKey`] when the key is `Null`, without touching the
    /// database; otherwise the driver's error.
    pub async fn delete(&self, record: &mut Record) -> Result<bool> {
        self.check_owner(record)?;
        let key = sql::key_param(record)?;
        let statement = sql::delete_sql(self.definition.schema()).ok_or_else(|| {
            SqlModelError::MissingPrimaryKey {
                model: self.definition.model_name().to_string(),
            }
        })?;

        let outcome = self.executor.execute(&statement, &[key]).await?;
        record.set_primary_key(RowValues::Null);
        Ok(match outcome {
            QueryOutcome::RowsAffected(n) => n > 0,
            QueryOutcome::Rows(_) => true,
        })
    }

    fn check_owner(&self, record: &Record) -> Result<()> {
        let owner = record.definition();
        if Arc::ptr_eq(owner, &self.definition)
            || (owner.table_name() == self.definition.table_name()
                && owner.model_name() == self.definition.model_name())
        {
            Ok(())
        } else {
            Err(SqlModelError::validation(format!(
                "record of {} cannot be persisted through {}",
                owner.model_name(),
                self.definition.model_name()
            )))
        }
    }
}

/// `SCOPE_IDENTITY()` is `numeric(38,0)`; bring it back to the key's own type.
fn coerce_identity(value: RowValues, native_type: NativeType) -> RowValues {
    if !native_type.is_integer() {
        return value;
    }
    match value {
        RowValues::Float(f) if f.fract() == 0.0 => {
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Int(f as i64)
        }
        RowValues::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => RowValues::Int(i),
            Err(_) => RowValues::Text(s),
        },
        other => other,
    }
}
