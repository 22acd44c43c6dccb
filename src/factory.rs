//! Model discovery: table names in, model definitions out.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, SqlModelError};
use crate::executor::Connection;
use crate::model::ModelDefinition;
use crate::schema::SchemaInspector;

/// One name or a list of names. Table and model names must have the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Names {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for Names {
    fn from(name: &str) -> Self {
        Names::Single(name.to_string())
    }
}

impl From<String> for Names {
    fn from(name: String) -> Self {
        Names::Single(name)
    }
}

impl From<Vec<String>> for Names {
    fn from(names: Vec<String>) -> Self {
        Names::Many(names)
    }
}

impl From<Vec<&str>> for Names {
    fn from(names: Vec<&str>) -> Self {
        Names::Many(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Names {
    fn from(names: [&str; N]) -> Self {
        Names::Many(names.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Pair table names with model names.
///
/// # Errors
///
/// - [`SqlModelError::ArgumentShapeMismatch`] when one side is a single name and the other a
///   list, or the lists differ in length.
/// - [`SqlModelError::Validation`] for empty lists or a model name given twice.
pub fn pair_names(tables: Names, models: Names) -> Result<Vec<(String, String)>> {
    let pairs = match (tables, models) {
        (Names::Single(table), Names::Single(model)) => vec![(table, model)],
        (Names::Many(tables), Names::Many(models)) => {
            if tables.len() != models.len() {
                return Err(SqlModelError::ArgumentShapeMismatch(format!(
                    "{} table name(s) but {} model name(s)",
                    tables.len(),
                    models.len()
                )));
            }
            tables.into_iter().zip(models).collect()
        }
        (Names::Many(_), Names::Single(_)) => {
            return Err(SqlModelError::ArgumentShapeMismatch(
                "If argument 1 (tableNames) is a list, then argument 2 (modelNames) must also be a list."
                    .to_string(),
            ));
        }
        (Names::Single(_), Names::Many(_)) => {
            return Err(SqlModelError::ArgumentShapeMismatch(
                "If argument 1 (tableName) is a single name, then argument 2 (modelName) must also be a single name."
                    .to_string(),
            ));
        }
    };

    if pairs.is_empty() {
        return Err(SqlModelError::validation("no table names supplied"));
    }
    for (i, (_, model)) in pairs.iter().enumerate() {
        if pairs[..i].iter().any(|(_, earlier)| earlier == model) {
            return Err(SqlModelError::validation(format!(
                "model name {model} given twice"
            )));
        }
    }
    Ok(pairs)
}

/// Builds model definitions from the catalog.
pub struct ModelFactory<C> {
    inspector: SchemaInspector<C>,
}

impl<C: Connection> ModelFactory<C> {
    #[must_use]
    pub fn new(inspector: SchemaInspector<C>) -> Self {
        Self { inspector }
    }

    /// Discover one model per table, keyed by model name. All tables are read with a
    /// single catalog query and each model receives only its own table's columns.
    ///
    /// # Errors
    ///
    /// Shape errors from [`pair_names`] before any query; then whatever
    /// [`SchemaInspector::discover_schemas`] returns.
    pub async fn discover(
        &self,
        tables: impl Into<Names>,
        models: impl Into<Names>,
    ) -> Result<HashMap<String, Arc<ModelDefinition>>> {
        let pairs = pair_names(tables.into(), models.into())?;
        let table_names: Vec<&str> = pairs.iter().map(|(t, _)| t.as_str()).collect();
        let schemas = self.inspector.discover_schemas(&table_names).await?;

        let definitions: HashMap<String, Arc<ModelDefinition>> = pairs
            .into_iter()
            .zip(schemas)
            .map(|((_, model), schema)| {
                let definition = Arc::new(ModelDefinition::new(model.clone(), schema));
                (model, definition)
            })
            .collect();
        info!(models = ?definitions.keys().collect::<Vec<_>>(), "models discovered");
        Ok(definitions)
    }
}
