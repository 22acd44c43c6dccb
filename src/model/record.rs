use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::trace;

use super::definition::ModelDefinition;
use crate::error::{Result, SqlModelError};
use crate::results::Row;
use crate::types::RowValues;

/// One row's values, one slot per schema column.
///
/// Records hold data only; persisting them is the job of [`Model`](super::Model).
#[derive(Debug, Clone)]
pub struct Record {
    definition: Arc<ModelDefinition>,
    values: Vec<RowValues>,
}

impl Record {
    pub(crate) fn empty(definition: Arc<ModelDefinition>) -> Self {
        let values = vec![RowValues::Null; definition.schema().len()];
        Self { definition, values }
    }

    /// Build a record from a result row.
    ///
    /// Only columns of the schema are copied; other row keys are ignored, and schema
    /// columns absent from the row stay `Null`.
    #[must_use]
    pub fn hydrate(definition: Arc<ModelDefinition>, row: &Row) -> Self {
        let mut record = Self::empty(definition);
        for (column, value) in row.iter() {
            match record.definition.schema().position(column) {
                Some(position) => record.values[position] = value.clone(),
                None => trace!(
                    model = record.definition.model_name(),
                    column,
                    "ignoring column not in schema"
                ),
            }
        }
        record
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        self.definition
            .schema()
            .position(column)
            .map(|i| &self.values[i])
    }

    /// Assign a field.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Validation`] when `column` is not in the schema or the value
    /// does not fit the column's type.
    pub fn set(&mut self, column: &str, value: impl Into<RowValues>) -> Result<&mut Self> {
        let value = value.into();
        let schema = self.definition.schema();
        let position = schema.position(column).ok_or_else(|| {
            SqlModelError::validation(format!(
                "{column} is not a field of {}",
                self.definition.model_name()
            ))
        })?;
        let native_type = schema.columns()[position].native_type;
        if !native_type.accepts(&value) {
            return Err(SqlModelError::validation(format!(
                "{} value cannot be assigned to {column} ({native_type})",
                value.kind()
            )));
        }
        self.values[position] = value;
        Ok(self)
    }

    /// The primary-key value, or `None` when the table has no primary key.
    #[must_use]
    pub fn primary_key_value(&self) -> Option<&RowValues> {
        self.definition
            .schema()
            .primary_key_position()
            .map(|i| &self.values[i])
    }

    /// True when saving would insert: the key is `Null` or the table has no key.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.primary_key_value().is_none_or(RowValues::is_null)
    }

    pub(crate) fn set_primary_key(&mut self, value: RowValues) {
        if let Some(i) = self.definition.schema().primary_key_position() {
            self.values[i] = value;
        }
    }

    /// `(column, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.definition
            .schema()
            .columns()
            .iter()
            .map(|c| c.name())
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .fields()
            .map(|(column, value)| (column.to_string(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}
