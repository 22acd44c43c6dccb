// MSSQL module - the SQL Server connection behind `Connection`
//
// - config: connection options and the tiberius config built from them
// - client: raw client creation
// - query: value binding, result extraction, and the batches the protocol runs
// - connection: `MssqlConnection`, the `Connection` implementation

pub mod client;
pub mod config;
mod connection;
pub mod query;

pub use client::{MssqlClient, create_mssql_client};
pub use config::{MssqlOptions, MssqlOptionsBuilder};
pub use connection::MssqlConnection;
