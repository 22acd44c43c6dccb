//! Statement text and bindings for model operations.
//!
//! Field order always follows the schema's column order, with the primary key left out of
//! the written fields and used only in the `WHERE` or identity clause.

use super::record::Record;
use crate::error::{Result, SqlModelError};
use crate::identifier::quote;
use crate::params::BoundParameter;
use crate::schema::TableSchema;
use crate::types::RowValues;
use crate::where_clause::{WhereClause, render};

/// `SELECT TOP <limit> * FROM [table]`, with a `WHERE` only when there are predicates.
#[must_use]
pub fn select_sql(schema: &TableSchema, clause: &WhereClause, limit: usize) -> String {
    let mut sql = format!("SELECT TOP {limit} * FROM {}", quote(schema.table_name()));
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&render(clause));
    }
    sql
}

/// INSERT of every non-key field, followed by the identity select when the table has a key.
#[must_use]
pub fn insert_sql(schema: &TableSchema) -> String {
    let table = quote(schema.table_name());
    let (fields, bindings): (Vec<String>, Vec<String>) = schema
        .writable_columns()
        .map(|c| (quote(c.name()), format!("@{}", c.name())))
        .unzip();

    let mut sql = if fields.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES;\n")
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({});\n",
            fields.join(", "),
            bindings.join(", ")
        )
    };
    if let Some(pk) = schema.primary_key() {
        sql.push_str(&format!("SELECT SCOPE_IDENTITY() AS {};\n", quote(pk.name())));
    }
    sql
}

/// UPDATE of every non-key field keyed on the primary key; `None` when there is nothing
/// to set or no key to match on.
#[must_use]
pub fn update_sql(schema: &TableSchema) -> Option<String> {
    let pk = schema.primary_key()?;
    let sets: Vec<String> = schema
        .writable_columns()
        .map(|c| format!("{} = @{}", quote(c.name()), c.name()))
        .collect();
    if sets.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {} SET {} WHERE {} = @{}",
        quote(schema.table_name()),
        sets.join(", "),
        quote(pk.name()),
        pk.name()
    ))
}

/// DELETE keyed on the primary key; `None` for tables without one.
#[must_use]
pub fn delete_sql(schema: &TableSchema) -> Option<String> {
    let pk = schema.primary_key()?;
    Some(format!(
        "DELETE FROM {} WHERE {} = @{}",
        quote(schema.table_name()),
        quote(pk.name()),
        pk.name()
    ))
}

/// Bindings for the non-key fields of `record`.
#[must_use]
pub fn write_params(record: &Record) -> Vec<BoundParameter> {
    let schema = record.definition().schema();
    schema
        .writable_columns()
        .map(|c| {
            let value = record.get(c.name()).cloned().unwrap_or(RowValues::Null);
            BoundParameter::new(c.name(), c.native_type, value)
        })
        .collect()
}

/// Binding for the primary key of `record`.
///
/// # Errors
///
/// [`SqlModelError::MissingPrimaryKey`] when the table has no key or the key is `Null`.
pub fn key_param(record: &Record) -> Result<BoundParameter> {
    let definition = record.definition();
    let missing = || SqlModelError::MissingPrimaryKey {
        model: definition.model_name().to_string(),
    };
    let pk = definition.schema().primary_key().ok_or_else(missing)?;
    match record.primary_key_value() {
        Some(value) if !value.is_null() => Ok(BoundParameter::new(
            pk.name(),
            pk.native_type,
            value.clone(),
        )),
        _ => Err(missing()),
    }
}
