//! Schema-driven record models for SQL Server.
//!
//! Tables are discovered at runtime from `INFORMATION_SCHEMA`; each becomes a
//! [`Model`] whose records can be found with a [`WhereClause`], saved (insert or
//! update, decided by the primary key) and deleted. Every statement is sent through
//! the prepared-statement protocol with parameters typed from the catalog. Stored
//! procedures are called with positional arguments typed from `sys.parameters`.
//!
//! Start with [`Session`].

pub mod error;
pub mod executor;
pub mod factory;
pub mod identifier;
pub mod model;
pub mod native_type;
pub mod params;
pub mod prelude;
pub mod procedure;
pub mod results;
pub mod schema;
pub mod session;
pub mod types;
pub mod where_clause;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Result, SqlModelError};
pub use executor::{Connection, QueryExecutor, QueryOutcome};
pub use factory::{ModelFactory, Names};
pub use model::{Model, ModelDefinition, Record};
pub use native_type::NativeType;
pub use procedure::{ProcedureResult, StoredProcedureInvoker};
pub use results::{ResultSet, Row};
pub use schema::{ColumnDescriptor, SchemaInspector, TableSchema};
pub use session::Session;
pub use types::RowValues;
pub use where_clause::{Operator, Predicate, WhereClause};

#[cfg(feature = "mssql")]
pub use mssql::{MssqlConnection, MssqlOptions};
