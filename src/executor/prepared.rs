use tracing::{trace, warn};

use super::connection::{Connection, QueryOutput, StatementHandle};
use crate::error::{Result, SqlModelError};
use crate::native_type::NativeType;
use crate::params::ParamDecl;
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Unprepared,
    Prepared(StatementHandle),
    Executing(StatementHandle),
}

/// Client-side half of the prepare / input / execute / unprepare protocol.
///
/// The statement walks `Unprepared -> Prepared -> Executing -> Prepared` and back to
/// `Unprepared` on [`unprepare`](Self::unprepare). Inputs can only be declared while
/// unprepared. [`run_prepared`] drives the whole sequence and always unprepares.
#[derive(Debug)]
pub struct PreparedStatement {
    sql: String,
    inputs: Vec<ParamDecl>,
    state: StatementState,
}

impl PreparedStatement {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            inputs: Vec::new(),
            state: StatementState::Unprepared,
        }
    }

    #[must_use]
    pub fn state(&self) -> StatementState {
        self.state
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Declare an input by name and type.
    ///
    /// # Errors
    ///
    /// Fails once the statement is prepared, or when the name is declared twice.
    pub fn input(&mut self, name: &str, native_type: NativeType) -> Result<&mut Self> {
        if self.state != StatementState::Unprepared {
            return Err(SqlModelError::validation(format!(
                "input @{name} declared after prepare"
            )));
        }
        if self.inputs.iter().any(|decl| decl.name == name) {
            return Err(SqlModelError::validation(format!(
                "input @{name} declared twice"
            )));
        }
        self.inputs.push(ParamDecl {
            name: name.to_string(),
            native_type,
        });
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns the driver error when the server rejects the statement.
    pub async fn prepare<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<()> {
        if self.state != StatementState::Unprepared {
            return Err(SqlModelError::validation("statement is already prepared"));
        }
        let handle = conn.prepare(&self.sql, &self.inputs).await?;
        trace!(handle = handle.0, "statement prepared");
        self.state = StatementState::Prepared(handle);
        Ok(())
    }

    /// Execute with values looked up by input name.
    ///
    /// # Errors
    ///
    /// Fails without a round trip when a declared input has no value; otherwise returns the
    /// driver error. The statement stays prepared either way.
    pub async fn execute<C: Connection + ?Sized>(
        &mut self,
        conn: &mut C,
        values: &[(&str, &RowValues)],
    ) -> Result<QueryOutput> {
        let StatementState::Prepared(handle) = self.state else {
            return Err(SqlModelError::validation("statement is not prepared"));
        };

        let ordered = self
            .inputs
            .iter()
            .map(|decl| {
                values
                    .iter()
                    .find(|(name, _)| *name == decl.name)
                    .map(|(_, value)| (*value).clone())
                    .ok_or_else(|| {
                        SqlModelError::validation(format!(
                            "no value bound for input @{}",
                            decl.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.state = StatementState::Executing(handle);
        let result = conn.execute_prepared(handle, &ordered).await;
        self.state = StatementState::Prepared(handle);
        result
    }

    /// # Errors
    ///
    /// Returns the driver error when the server fails to release the handle. The statement
    /// is considered unprepared regardless.
    pub async fn unprepare<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<()> {
        let handle = match self.state {
            StatementState::Unprepared => return Ok(()),
            StatementState::Prepared(handle) | StatementState::Executing(handle) => handle,
        };
        self.state = StatementState::Unprepared;
        trace!(handle = handle.0, "statement unprepared");
        conn.unprepare(handle).await
    }
}

impl Drop for PreparedStatement {
    fn drop(&mut self) {
        if let StatementState::Prepared(handle) | StatementState::Executing(handle) = self.state {
            warn!(
                handle = handle.0,
                sql = %self.sql,
                "prepared statement dropped without unprepare"
            );
        }
    }
}

/// Prepare, bind and execute `sql`, then unprepare on every exit path.
///
/// An execute error wins over a cleanup error; the latter is logged.
///
/// # Errors
///
/// Returns the first protocol step's failure.
pub async fn run_prepared<C: Connection + ?Sized>(
    conn: &mut C,
    sql: &str,
    inputs: &[(&str, NativeType, &RowValues)],
) -> Result<QueryOutput> {
    let mut statement = PreparedStatement::new(sql);
    for (name, native_type, _) in inputs {
        statement.input(name, *native_type)?;
    }
    statement.prepare(conn).await?;

    let values: Vec<(&str, &RowValues)> = inputs.iter().map(|(n, _, v)| (*n, *v)).collect();
    let executed = statement.execute(conn, &values).await;
    let released = statement.unprepare(conn).await;

    match (executed, released) {
        (Ok(output), Ok(())) => Ok(output),
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup)) => {
            warn!(error = %cleanup, "unprepare failed after execute error");
            Err(err)
        }
    }
}
