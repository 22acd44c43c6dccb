use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt;
use tiberius::{ColumnData, FromSql, Query, QueryItem, QueryStream};

use crate::error::{Result, SqlModelError};
use crate::identifier::{check_object_name, check_param_name};
use crate::native_type::NativeType;
use crate::params::{BoundParameter, ParamDecl, definition_list};
use crate::results::ResultSet;
use crate::types::RowValues;

/// Column of the trailing result set that carries `@@ROWCOUNT`.
pub const ROWS_AFFECTED_COLUMN: &str = "__rows_affected";
/// Column of the trailing result set that carries a procedure's return status.
pub const RETURN_VALUE_COLUMN: &str = "__return_value";
pub const HANDLE_COLUMN: &str = "__handle";

/// Prepares `@P2` with definition list `@P1` and selects the new handle.
pub const PREPARE_BATCH: &str = "DECLARE @handle int;\n\
     EXEC sp_prepare @handle OUTPUT, @P1, @P2;\n\
     SELECT @handle AS [__handle];";

pub const UNPREPARE_BATCH: &str = "EXEC sp_unprepare @P1;";

/// Runs `@P1` as its own inner batch, then reports the affected-row count.
pub const SIMPLE_BATCH: &str = "EXEC sp_executesql @P1;\n\
     SELECT @@ROWCOUNT AS [__rows_affected];";

/// Outer batch text plus the text arguments bound to it as `@P1..`.
///
/// Caller SQL only ever travels as an argument, so it reaches the server unchanged and
/// runs in a batch of its own (`CREATE PROCEDURE` and friends must be alone in theirs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBatch {
    pub text: &'static str,
    pub args: Vec<String>,
}

impl TextBatch {
    /// `sql` run through `sp_executesql`, followed by the `@@ROWCOUNT` marker set.
    #[must_use]
    pub fn simple(sql: &str) -> Self {
        Self {
            text: SIMPLE_BATCH,
            args: vec![sql.to_string()],
        }
    }

    /// `sp_prepare` of `sql` with the declared inputs.
    #[must_use]
    pub fn prepare(sql: &str, inputs: &[ParamDecl]) -> Self {
        Self {
            text: PREPARE_BATCH,
            args: vec![definition_list(inputs), sql.to_string()],
        }
    }

    #[must_use]
    pub fn into_query(self) -> Query<'static> {
        let mut query = Query::new(self.text);
        for arg in self.args {
            query.bind(arg);
        }
        query
    }
}

/// `EXEC sp_execute @P1, @P2, ...` (the handle followed by one placeholder per value), then
/// the `@@ROWCOUNT` marker set.
#[must_use]
pub fn execute_batch(value_count: usize) -> String {
    let mut sql = String::from("EXEC sp_execute @P1");
    for i in 0..value_count {
        sql.push_str(&format!(", @P{}", i + 2));
    }
    sql.push_str(&format!(";\nSELECT @@ROWCOUNT AS [{ROWS_AFFECTED_COLUMN}];"));
    sql
}

/// A batch that calls `procedure` with named arguments and selects its return status.
///
/// # Errors
///
/// Returns [`SqlModelError::Validation`] for a malformed procedure or parameter name.
pub fn procedure_batch(procedure: &str, params: &[BoundParameter]) -> Result<String> {
    check_object_name(procedure)?;
    let arguments = params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            check_param_name(&p.name)?;
            Ok(format!("@{} = @P{}", p.name, i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut sql = format!("DECLARE @return_value int;\nEXEC @return_value = {procedure}");
    if !arguments.is_empty() {
        sql.push(' ');
        sql.push_str(&arguments.join(", "));
    }
    sql.push_str(&format!(
        ";\nSELECT @return_value AS [{RETURN_VALUE_COLUMN}];"
    ));
    Ok(sql)
}

/// Bind one value. `Null` is typed from `native_type` when known, since an untyped
/// `NULL` cannot convert to binary parameters.
pub fn bind_value(query: &mut Query<'_>, value: &RowValues, native_type: Option<NativeType>) {
    match value {
        RowValues::Int(i) => query.bind(*i),
        RowValues::Float(f) => query.bind(*f),
        RowValues::Text(s) => query.bind(s.clone()),
        RowValues::Bool(b) => query.bind(*b),
        RowValues::Timestamp(dt) => query.bind(*dt),
        RowValues::Null => match native_type {
            Some(
                NativeType::Binary { .. }
                | NativeType::VarBinary { .. }
                | NativeType::Image
                | NativeType::Udt
                | NativeType::Geography
                | NativeType::Geometry,
            ) => query.bind(Option::<Vec<u8>>::None),
            _ => query.bind(Option::<String>::None),
        },
        RowValues::JSON(jsval) => query.bind(jsval.to_string()),
        RowValues::Blob(bytes) => query.bind(bytes.clone()),
    }
}

/// Drain a query stream into result sets, one per metadata token, so sets without rows
/// keep their column names.
///
/// # Errors
///
/// Returns the driver's error when the stream fails or a cell cannot be decoded.
pub async fn collect_result_sets(mut stream: QueryStream<'_>) -> Result<Vec<ResultSet>> {
    let mut sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let names: Vec<String> =
                    meta.columns().iter().map(|c| c.name().to_string()).collect();
                let mut result_set = ResultSet::with_capacity(10);
                result_set.set_column_names(Arc::new(names));
                sets.push(result_set);
            }
            QueryItem::Row(row) => {
                let values = row
                    .into_iter()
                    .map(|data| extract_value(&data))
                    .collect::<Result<Vec<_>>>()?;
                if sets.is_empty() {
                    sets.push(ResultSet::default());
                }
                if let Some(result_set) = sets.last_mut() {
                    result_set.add_row_values(values);
                }
            }
        }
    }
    Ok(sets)
}

/// Remove the last result set when it is the single-column marker set named `column`,
/// returning its first value.
pub fn take_trailing_scalar(sets: &mut Vec<ResultSet>, column: &str) -> Option<RowValues> {
    let is_marker = sets.last().is_some_and(|rs| {
        rs.column_names()
            .is_some_and(|names| names.len() == 1 && names[0] == column)
    });
    if !is_marker {
        return None;
    }
    let marker = sets.pop()?;
    marker
        .results
        .into_iter()
        .next()
        .and_then(|row| row.get(column).cloned())
}

/// Read the marker set named `column` as an integer.
///
/// # Errors
///
/// Returns [`SqlModelError::Database`] when the set is missing or not an integer.
pub fn take_trailing_int(sets: &mut Vec<ResultSet>, column: &str) -> Result<Option<i64>> {
    match take_trailing_scalar(sets, column) {
        None => Err(SqlModelError::database(format!(
            "batch did not return its {column} result set"
        ))),
        Some(RowValues::Null) => Ok(None),
        Some(value) => value.as_int().map(Some).ok_or_else(|| {
            SqlModelError::database(format!("{column} is not an integer ({})", value.kind()))
        }),
    }
}

/// Decode one cell.
///
/// # Errors
///
/// Returns the driver's error for a date or time cell it cannot convert.
pub fn extract_value(data: &ColumnData<'static>) -> Result<RowValues> {
    let value = match data {
        ColumnData::U8(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(RowValues::Null, RowValues::Int),
        ColumnData::F32(v) => v.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(RowValues::Null, RowValues::Float),
        ColumnData::Bit(v) => v.map_or(RowValues::Null, RowValues::Bool),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(RowValues::Null, |s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.map_or(RowValues::Null, |g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(RowValues::Null, |b| RowValues::Blob(b.to_vec())),
        ColumnData::Numeric(v) => match v {
            None => RowValues::Null,
            // integral numerics (SCOPE_IDENTITY, decimal(p,0)) stay integers
            Some(n) if n.scale() == 0 => match i64::try_from(n.value()) {
                Ok(i) => RowValues::Int(i),
                Err(_) => RowValues::Float(f64::from(*n)),
            },
            Some(n) => RowValues::Float(f64::from(*n)),
        },
        ColumnData::Xml(v) => v
            .as_ref()
            .map_or(RowValues::Null, |x| RowValues::Text(x.as_ref().clone().into_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map_or(RowValues::Null, RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?
            .map_or(RowValues::Null, |d| RowValues::Timestamp(d.and_time(NaiveTime::MIN))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?
            .map_or(RowValues::Null, |t| RowValues::Text(t.to_string())),
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)?
            .map_or(RowValues::Null, |dt| RowValues::Timestamp(dt.naive_utc())),
    };
    Ok(value)
}
