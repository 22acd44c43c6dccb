//! Stored procedure calls with arguments bound by ordinal position.

use tracing::debug;

use crate::error::{Result, SqlModelError};
use crate::executor::{Connection, QueryExecutor};
use crate::identifier::check_object_name;
use crate::native_type::{Length, NativeType, map_type};
use crate::params::BoundParameter;
use crate::results::{ResultSet, Row};
use crate::schema::ColumnDescriptor;
use crate::schema::inspector::{optional_int, required_text};
use crate::types::RowValues;

const PROCEDURE_NAME_TYPE: NativeType = NativeType::NVarChar {
    length: Length::Bounded(776),
};

/// Parameter metadata of one procedure, bound as `@ProcedureName`.
///
/// `sys.parameters` reports byte lengths; Unicode character types are halved back to
/// character counts so they map the same way catalog columns do.
#[must_use]
pub fn parameters_sql() -> &'static str {
    "SELECT p.name AS NAME,\n\
     \x20   TYPE_NAME(p.user_type_id) AS TYPE,\n\
     \x20   CAST(CASE WHEN TYPE_NAME(p.user_type_id) IN ('nchar', 'nvarchar') AND p.max_length > 0\n\
     \x20       THEN p.max_length / 2 ELSE p.max_length END AS int) AS LENGTH,\n\
     \x20   CAST(p.precision AS int) AS PRECISION,\n\
     \x20   CAST(p.scale AS int) AS SCALE,\n\
     \x20   p.parameter_id AS [ORDER]\n\
     FROM sys.parameters p\n\
     WHERE p.object_id = OBJECT_ID(@ProcedureName) AND p.parameter_id > 0\n\
     ORDER BY p.parameter_id"
}

/// A declared procedure parameter in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParameter {
    /// Name without the leading `@`.
    pub name: String,
    pub native_type: NativeType,
    pub ordinal: i32,
}

/// Everything a procedure call returned.
#[derive(Debug, Clone, Default)]
pub struct ProcedureResult {
    pub result_sets: Vec<ResultSet>,
    pub return_value: Option<i64>,
}

impl ProcedureResult {
    /// The first result set, or an empty one.
    #[must_use]
    pub fn first_result_set(&self) -> ResultSet {
        self.result_sets.first().cloned().unwrap_or_default()
    }
}

/// Calls stored procedures, typing each argument from the procedure's own declaration.
pub struct StoredProcedureInvoker<C> {
    executor: QueryExecutor<C>,
}

impl<C: Connection> StoredProcedureInvoker<C> {
    #[must_use]
    pub fn new(executor: QueryExecutor<C>) -> Self {
        Self { executor }
    }

    /// Declared parameters of `procedure`, in ordinal order.
    ///
    /// # Errors
    ///
    /// - [`SqlModelError::Validation`] for a malformed procedure name.
    /// - [`SqlModelError::UnrecognizedType`] when a parameter type cannot be mapped.
    /// - [`SqlModelError::Database`] when the metadata query fails.
    pub async fn parameters(&self, procedure: &str) -> Result<Vec<ProcedureParameter>> {
        check_object_name(procedure)?;
        let rows = self
            .executor
            .execute(
                parameters_sql(),
                &[BoundParameter::new("ProcedureName", PROCEDURE_NAME_TYPE, procedure)],
            )
            .await?
            .into_rows();
        rows.iter().map(|row| parse_parameter_row(procedure, row)).collect()
    }

    /// Call `procedure` with `args` bound to its parameters by position.
    ///
    /// The argument count is checked against the declaration before the procedure runs.
    ///
    /// # Errors
    ///
    /// - [`SqlModelError::ArgumentCountMismatch`] when `args` and the declaration differ in
    ///   length.
    /// - [`SqlModelError::Validation`] when an argument does not fit its parameter's type.
    /// - Whatever the metadata query or the procedure itself raises.
    pub async fn call(&self, procedure: &str, args: Vec<RowValues>) -> Result<ProcedureResult> {
        let declared = self.parameters(procedure).await?;
        if declared.len() != args.len() {
            return Err(SqlModelError::ArgumentCountMismatch {
                procedure: procedure.to_string(),
                expected: declared.len(),
                actual: args.len(),
            });
        }

        let params = bind_arguments(&declared, args)?;
        debug!(procedure, arguments = params.len(), "invoking procedure");
        let output = self.executor.call_procedure(procedure, &params).await?;
        Ok(ProcedureResult {
            result_sets: output.result_sets,
            return_value: output.return_value,
        })
    }
}

/// Pair each argument with the parameter at the same position.
///
/// # Errors
///
/// [`SqlModelError::Validation`] for an argument its parameter's type cannot hold.
pub fn bind_arguments(
    declared: &[ProcedureParameter],
    args: Vec<RowValues>,
) -> Result<Vec<BoundParameter>> {
    declared
        .iter()
        .zip(args)
        .map(|(param, value)| {
            if !param.native_type.accepts(&value) {
                return Err(SqlModelError::validation(format!(
                    "argument {} ({}) does not fit parameter @{} {}",
                    param.ordinal,
                    value.kind(),
                    param.name,
                    param.native_type.declaration()
                )));
            }
            Ok(BoundParameter::new(&param.name, param.native_type, value))
        })
        .collect()
}

fn parse_parameter_row(procedure: &str, row: &Row) -> Result<ProcedureParameter> {
    let raw_name = required_text(row, "NAME")?;
    let name = raw_name.trim_start_matches('@').to_string();
    let ordinal = optional_int(row, "ORDER")?.unwrap_or(0);
    let descriptor = ColumnDescriptor {
        table_name: procedure.to_string(),
        table_schema: None,
        name: name.clone(),
        data_type: required_text(row, "TYPE")?,
        max_length: optional_int(row, "LENGTH")?,
        precision: optional_int(row, "PRECISION")?,
        scale: optional_int(row, "SCALE")?,
        ordinal,
        nullable: true,
        primary_key: false,
    };
    Ok(ProcedureParameter {
        native_type: map_type(&descriptor)?,
        name,
        ordinal,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn parameter_row(name: &str, type_name: &str, length: i64, order: i64) -> Row {
        Row::new(
            Arc::new(
                ["NAME", "TYPE", "LENGTH", "PRECISION", "SCALE", "ORDER"]
                    .map(String::from)
                    .to_vec(),
            ),
            vec![
                RowValues::from(name),
                RowValues::from(type_name),
                RowValues::Int(length),
                RowValues::Int(0),
                RowValues::Int(0),
                RowValues::Int(order),
            ],
        )
    }

    #[test]
    fn parameter_rows_strip_the_at_sign() {
        let row = parameter_row("@LastName", "nvarchar", 50, 1);
        let param = parse_parameter_row("dbo.GetPeople", &row).unwrap();
        assert_eq!(param.name, "LastName");
        assert_eq!(
            param.native_type,
            NativeType::NVarChar {
                length: Length::Bounded(50)
            }
        );
        assert_eq!(param.ordinal, 1);
    }

    #[test]
    fn arguments_bind_by_position() {
        let declared = vec![
            parse_parameter_row("p", &parameter_row("@Id", "int", 4, 1)).unwrap(),
            parse_parameter_row("p", &parameter_row("@Name", "varchar", 10, 2)).unwrap(),
        ];
        let bound = bind_arguments(&declared, vec![RowValues::Int(7), "Jon".into()]).unwrap();
        assert_eq!(bound[0].name, "Id");
        assert_eq!(bound[1].value, RowValues::Text("Jon".into()));

        let err = bind_arguments(&declared, vec![RowValues::Int(7), "far too long".into()])
            .unwrap_err();
        assert!(matches!(err, SqlModelError::Validation(_)));
    }

    #[test]
    fn metadata_query_halves_unicode_lengths() {
        let sql = parameters_sql();
        assert!(sql.contains("p.max_length / 2"));
        assert!(sql.contains("OBJECT_ID(@ProcedureName)"));
        assert!(sql.ends_with("ORDER BY p.parameter_id"));
    }
}
