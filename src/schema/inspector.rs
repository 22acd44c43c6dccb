use tracing::debug;

use super::{ColumnDescriptor, TableSchema};
use crate::error::{Result, SqlModelError};
use crate::executor::{Connection, QueryExecutor};
use crate::native_type::{Length, NativeType, map_type};
use crate::params::BoundParameter;
use crate::results::Row;
use crate::types::RowValues;

const TABLE_NAME_TYPE: NativeType = NativeType::NVarChar {
    length: Length::Bounded(128),
};

/// Catalog query for the columns of `table_count` tables, bound as `@Table0..@TableN`.
///
/// The constraint joins recover primary-key membership; a column taking part in several
/// constraints comes back once per constraint. Joins match on schema as well as table, so
/// same-named tables in different schemas never share constraints.
#[must_use]
pub fn columns_sql(table_count: usize) -> String {
    let placeholders = (0..table_count)
        .map(|i| format!("@Table{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT c.TABLE_SCHEMA, c.TABLE_NAME, c.COLUMN_NAME, c.DATA_TYPE,\n\
         \x20   c.CHARACTER_MAXIMUM_LENGTH,\n\
         \x20   CAST(c.NUMERIC_PRECISION AS int) AS NUMERIC_PRECISION,\n\
         \x20   CAST(COALESCE(c.NUMERIC_SCALE, c.DATETIME_PRECISION) AS int) AS NUMERIC_SCALE,\n\
         \x20   c.ORDINAL_POSITION, c.IS_NULLABLE, tc.CONSTRAINT_TYPE\n\
         FROM INFORMATION_SCHEMA.COLUMNS c\n\
         LEFT OUTER JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE ccu\n\
         \x20   ON c.TABLE_SCHEMA = ccu.TABLE_SCHEMA\n\
         \x20   AND c.TABLE_NAME = ccu.TABLE_NAME\n\
         \x20   AND ccu.COLUMN_NAME = c.COLUMN_NAME\n\
         LEFT OUTER JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc\n\
         \x20   ON c.TABLE_SCHEMA = tc.TABLE_SCHEMA\n\
         \x20   AND c.TABLE_NAME = tc.TABLE_NAME\n\
         \x20   AND tc.CONSTRAINT_SCHEMA = ccu.CONSTRAINT_SCHEMA\n\
         \x20   AND tc.CONSTRAINT_NAME = ccu.CONSTRAINT_NAME\n\
         WHERE c.TABLE_NAME IN ({placeholders})\n\
         ORDER BY c.TABLE_NAME, c.TABLE_SCHEMA, c.ORDINAL_POSITION"
    )
}

/// Reads table structure from `INFORMATION_SCHEMA`.
pub struct SchemaInspector<C> {
    executor: QueryExecutor<C>,
}

impl<C: Connection> SchemaInspector<C> {
    #[must_use]
    pub fn new(executor: QueryExecutor<C>) -> Self {
        Self { executor }
    }

    /// Fetch the column descriptors of `tables` in one catalog query, ordered by table then
    /// ordinal position.
    ///
    /// # Errors
    ///
    /// - [`SqlModelError::SchemaNotFound`] when the catalog returns no rows.
    /// - [`SqlModelError::UnrecognizedType`] when a column's type cannot be mapped.
    /// - [`SqlModelError::Database`] when the catalog query fails or returns malformed rows.
    pub async fn discover_columns(&self, tables: &[&str]) -> Result<Vec<ColumnDescriptor>> {
        if tables.is_empty() {
            return Err(SqlModelError::validation("no table names supplied"));
        }

        let params: Vec<BoundParameter> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| BoundParameter::new(format!("Table{i}"), TABLE_NAME_TYPE, *t))
            .collect();
        let rows = self
            .executor
            .execute(&columns_sql(tables.len()), &params)
            .await?
            .into_rows();

        if rows.is_empty() {
            return Err(SqlModelError::SchemaNotFound {
                table: tables.join(", "),
            });
        }

        let mut descriptors: Vec<ColumnDescriptor> = Vec::with_capacity(rows.len());
        for row in &rows {
            let parsed = parse_column_row(row)?;
            match descriptors
                .iter_mut()
                .find(|d| {
                    d.table_schema == parsed.table_schema
                        && d.table_name == parsed.table_name
                        && d.name == parsed.name
                })
            {
                Some(existing) => existing.primary_key |= parsed.primary_key,
                None => descriptors.push(parsed),
            }
        }

        for descriptor in &descriptors {
            map_type(descriptor)?;
        }
        debug!(tables = ?tables, columns = descriptors.len(), "discovered columns");
        Ok(descriptors)
    }

    /// Discover and build one schema per requested table, in the order requested.
    ///
    /// # Errors
    ///
    /// Everything [`discover_columns`](Self::discover_columns) returns, plus
    /// [`SqlModelError::SchemaNotFound`] for any single table with no columns.
    pub async fn discover_schemas(&self, tables: &[&str]) -> Result<Vec<TableSchema>> {
        let descriptors = self.discover_columns(tables).await?;
        build_schemas(tables, descriptors)
    }
}

/// Partition descriptors by table, matching names the way the default collation does.
///
/// # Errors
///
/// - [`SqlModelError::SchemaNotFound`] for a requested table with no descriptors.
/// - [`SqlModelError::Validation`] when the name matches tables in more than one schema.
/// - Whatever [`TableSchema::new`] rejects.
pub fn build_schemas(
    tables: &[&str],
    descriptors: Vec<ColumnDescriptor>,
) -> Result<Vec<TableSchema>> {
    tables
        .iter()
        .map(|table| {
            let own: Vec<ColumnDescriptor> = descriptors
                .iter()
                .filter(|d| d.table_name.eq_ignore_ascii_case(table))
                .cloned()
                .collect();
            let mut schemas: Vec<&str> =
                own.iter().filter_map(|d| d.table_schema.as_deref()).collect();
            schemas.sort_unstable();
            schemas.dedup();
            if schemas.len() > 1 {
                return Err(SqlModelError::validation(format!(
                    "table {table} exists in more than one schema ({})",
                    schemas.join(", ")
                )));
            }
            let name = own.first().map_or(*table, |d| d.table_name.as_str()).to_string();
            TableSchema::new(&name, own)
        })
        .collect()
}

fn parse_column_row(row: &Row) -> Result<ColumnDescriptor> {
    Ok(ColumnDescriptor {
        table_name: required_text(row, "TABLE_NAME")?,
        table_schema: match row.get("TABLE_SCHEMA") {
            Some(RowValues::Text(s)) => Some(s.clone()),
            _ => None,
        },
        name: required_text(row, "COLUMN_NAME")?,
        data_type: required_text(row, "DATA_TYPE")?,
        max_length: optional_int(row, "CHARACTER_MAXIMUM_LENGTH")?,
        precision: optional_int(row, "NUMERIC_PRECISION")?,
        scale: optional_int(row, "NUMERIC_SCALE")?,
        ordinal: optional_int(row, "ORDINAL_POSITION")?.unwrap_or(0),
        nullable: matches!(
            row.get("IS_NULLABLE"),
            Some(RowValues::Text(s)) if s.eq_ignore_ascii_case("YES")
        ),
        primary_key: matches!(
            row.get("CONSTRAINT_TYPE"),
            Some(RowValues::Text(s)) if s == "PRIMARY KEY"
        ),
    })
}

pub(crate) fn required_text(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(RowValues::Text(s)) => Ok(s.clone()),
        other => Err(SqlModelError::database(format!(
            "catalog row has no text {column} (found {})",
            other.map_or("nothing", RowValues::kind)
        ))),
    }
}

pub(crate) fn optional_int(row: &Row, column: &str) -> Result<Option<i32>> {
    match row.get(column) {
        None | Some(RowValues::Null) => Ok(None),
        Some(value) => value
            .as_int()
            .and_then(|i| i32::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| {
                SqlModelError::database(format!(
                    "catalog column {column} is not an integer (found {})",
                    value.kind()
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_sql_binds_every_table() {
        let sql = columns_sql(2);
        assert!(sql.contains("WHERE c.TABLE_NAME IN (@Table0, @Table1)"));
        assert!(sql.contains("INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE"));
        assert!(sql.ends_with("ORDER BY c.TABLE_NAME, c.TABLE_SCHEMA, c.ORDINAL_POSITION"));
    }

    #[test]
    fn constraint_joins_match_on_schema() {
        let sql = columns_sql(1);
        assert!(sql.starts_with("SELECT c.TABLE_SCHEMA, c.TABLE_NAME"));
        assert!(sql.contains("ON c.TABLE_SCHEMA = ccu.TABLE_SCHEMA"));
        assert!(sql.contains("ON c.TABLE_SCHEMA = tc.TABLE_SCHEMA"));
        assert!(sql.contains("AND tc.CONSTRAINT_SCHEMA = ccu.CONSTRAINT_SCHEMA"));
    }

    #[test]
    fn same_table_name_in_two_schemas_is_ambiguous() {
        let in_schema = |schema: &str, pk: bool| {
            let mut d = crate::schema::tests::descriptor("RecordId", "int", None, pk);
            d.table_schema = Some(schema.to_string());
            d
        };
        let both = vec![in_schema("audit", false), in_schema("dbo", true)];
        let err = build_schemas(&["People"], both).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: table People exists in more than one schema (audit, dbo)"
        );

        let schemas = build_schemas(&["People"], vec![in_schema("dbo", true)]).unwrap();
        assert_eq!(schemas[0].primary_key().map(|c| c.name()), Some("RecordId"));
    }
}
