use std::sync::Arc;

use serde::Serialize;

use super::record::Record;
use crate::schema::TableSchema;

/// A model discovered from one table: its names and its shared, immutable schema.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDefinition {
    table_name: String,
    model_name: String,
    schema: Arc<TableSchema>,
}

impl ModelDefinition {
    #[must_use]
    pub fn new(model_name: impl Into<String>, schema: TableSchema) -> Self {
        Self {
            table_name: schema.table_name().to_string(),
            model_name: model_name.into(),
            schema: Arc::new(schema),
        }
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.schema.primary_key().map(|c| c.name())
    }

    /// A record with every field `Null`.
    #[must_use]
    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::empty(Arc::clone(self))
    }
}
