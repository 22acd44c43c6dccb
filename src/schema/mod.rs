//! Catalog-derived table structure.

pub(crate) mod inspector;

use std::collections::HashMap;

use serde::Serialize;

pub use inspector::{SchemaInspector, build_schemas, columns_sql};

use crate::error::{Result, SqlModelError};
use crate::identifier::check_param_name;
use crate::native_type::{NativeType, map_type};

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub table_name: String,
    /// Owning schema (`dbo`, ...) when the catalog reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_schema: Option<String>,
    pub name: String,
    /// Raw SQL type name, e.g. `varchar`.
    pub data_type: String,
    /// Character or byte length; `-1` for `(max)`.
    pub max_length: Option<i32>,
    pub precision: Option<i32>,
    /// Numeric scale, or fractional-second precision for time-like types.
    pub scale: Option<i32>,
    pub ordinal: i32,
    pub nullable: bool,
    pub primary_key: bool,
}

/// A column together with its mapped parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    #[serde(flatten)]
    pub descriptor: ColumnDescriptor,
    pub native_type: NativeType,
}

impl SchemaColumn {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// The columns of one table in catalog order, with at most one primary-key column.
///
/// Built once per discovery and shared read-only by everything that works on the table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    table_name: String,
    columns: Vec<SchemaColumn>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    primary_key: Option<usize>,
}

impl TableSchema {
    /// Build a schema from the descriptors of a single table.
    ///
    /// # Errors
    ///
    /// - [`SqlModelError::SchemaNotFound`] when `descriptors` is empty.
    /// - [`SqlModelError::Validation`] when more than one column is flagged as primary key,
    ///   a column name is repeated, or a column name cannot serve as a parameter name.
    /// - [`SqlModelError::UnrecognizedType`] for a column of an unmapped type.
    pub fn new(table_name: &str, descriptors: Vec<ColumnDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(SqlModelError::SchemaNotFound {
                table: table_name.to_string(),
            });
        }

        let mut columns = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());
        let mut primary_key = None;

        for descriptor in descriptors {
            check_param_name(&descriptor.name)?;
            let position = columns.len();
            if index.insert(descriptor.name.clone(), position).is_some() {
                return Err(SqlModelError::validation(format!(
                    "column {} appears twice in table {table_name}",
                    descriptor.name
                )));
            }
            if descriptor.primary_key {
                if let Some(existing) = primary_key {
                    let existing: &SchemaColumn = &columns[existing];
                    return Err(SqlModelError::validation(format!(
                        "table {table_name} has a composite primary key ({}, {}); only single-column keys are supported",
                        existing.name(),
                        descriptor.name
                    )));
                }
                primary_key = Some(position);
            }
            let native_type = map_type(&descriptor)?;
            columns.push(SchemaColumn {
                descriptor,
                native_type,
            });
        }

        Ok(Self {
            table_name: table_name.to_string(),
            columns,
            index,
            primary_key,
        })
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in catalog order.
    #[must_use]
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn native_type(&self, name: &str) -> Option<NativeType> {
        self.column(name).map(|c| c.native_type)
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&SchemaColumn> {
        self.primary_key.map(|i| &self.columns[i])
    }

    #[must_use]
    pub fn primary_key_position(&self) -> Option<usize> {
        self.primary_key
    }

    /// Non-key columns in catalog order: the fields written by INSERT and UPDATE.
    pub fn writable_columns(&self) -> impl Iterator<Item = &SchemaColumn> {
        let pk = self.primary_key;
        self.columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != pk)
            .map(|(_, c)| c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn descriptor(
        name: &str,
        data_type: &str,
        len: Option<i32>,
        pk: bool,
    ) -> ColumnDescriptor {
        ColumnDescriptor {
            table_name: "People".into(),
            table_schema: None,
            name: name.into(),
            data_type: data_type.into(),
            max_length: len,
            precision: None,
            scale: None,
            ordinal: 0,
            nullable: !pk,
            primary_key: pk,
        }
    }

    #[test]
    fn keeps_catalog_order_and_finds_key() {
        let schema = TableSchema::new(
            "People",
            vec![
                descriptor("RecordId", "int", None, true),
                descriptor("FirstName", "varchar", Some(20), false),
                descriptor("LastName", "varchar", Some(20), false),
            ],
        )
        .unwrap();

        assert_eq!(schema.primary_key().unwrap().name(), "RecordId");
        let writable: Vec<_> = schema.writable_columns().map(SchemaColumn::name).collect();
        assert_eq!(writable, ["FirstName", "LastName"]);
        assert_eq!(schema.native_type("RecordId"), Some(NativeType::Int));
    }

    #[test]
    fn empty_schema_is_not_found() {
        let err = TableSchema::new("Nope", Vec::new()).unwrap_err();
        assert!(matches!(err, SqlModelError::SchemaNotFound { table } if table == "Nope"));
    }

    #[test]
    fn composite_key_is_rejected() {
        let err = TableSchema::new(
            "People",
            vec![
                descriptor("A", "int", None, true),
                descriptor("B", "int", None, true),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SqlModelError::Validation(_)));
    }
}
