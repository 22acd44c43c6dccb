//! Synthesized table models.
//!
//! A [`ModelDefinition`] owns the discovered schema of one table, a [`Record`] is one row's
//! worth of values, and a [`Model`] runs find / save / delete for records of its definition.

mod accessor;
mod definition;
mod record;
pub mod sql;

pub use accessor::Model;
pub use definition::ModelDefinition;
pub use record::Record;

/// Row cap applied by [`Model::find`] when the caller passes no limit.
pub const DEFAULT_FIND_LIMIT: usize = 10;
