//! Convenient imports for common functionality.

pub use crate::error::SqlModelError;
pub use crate::executor::{Connection, QueryOutcome};
pub use crate::model::{Model, Record};
pub use crate::native_type::NativeType;
pub use crate::procedure::ProcedureResult;
pub use crate::results::{ResultSet, Row};
pub use crate::session::Session;
pub use crate::types::RowValues;
pub use crate::where_clause::{Operator, Predicate, WhereClause};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlConnection, MssqlOptions};
