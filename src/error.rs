use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SqlModelError>;

#[derive(Debug, Error)]
pub enum SqlModelError {
    /// Malformed predicate, unknown column, bad value for a column, or an invalid identifier.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "No column data returned for table [{table}]. Perhaps you misspelled the name of the table?"
    )]
    SchemaNotFound { table: String },

    #[error("Argument shape mismatch: {0}")]
    ArgumentShapeMismatch(String),

    #[error(
        "Procedure {procedure} declares {expected} parameter(s) but {actual} argument(s) were supplied"
    )]
    ArgumentCountMismatch {
        procedure: String,
        expected: usize,
        actual: usize,
    },

    #[error("{model} has no primary key value. Cannot delete.")]
    MissingPrimaryKey { model: String },

    #[error("Unrecognized data type {0}")]
    UnrecognizedType(String),

    /// Driver failure; the message is the driver's, unchanged.
    #[error("{0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    Mssql(#[from] tiberius::error::Error),
}

impl SqlModelError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SqlModelError::Validation(msg.into())
    }

    pub(crate) fn database(msg: impl Into<String>) -> Self {
        SqlModelError::Database(msg.into())
    }

    /// True for errors raised before any statement reaches the database.
    #[must_use]
    pub fn is_validation_class(&self) -> bool {
        matches!(
            self,
            SqlModelError::Validation(_)
                | SqlModelError::ArgumentShapeMismatch(_)
                | SqlModelError::ArgumentCountMismatch { .. }
                | SqlModelError::MissingPrimaryKey { .. }
                | SqlModelError::UnrecognizedType(_)
        )
    }
}
