use std::net::ToSocketAddrs;

use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::config::{MssqlOptions, build_tiberius_config};
use crate::error::{Result, SqlModelError};

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Open a raw tiberius client for `opts`.
///
/// # Errors
/// Returns `SqlModelError::Connection` if the address does not resolve, the TCP connect
/// fails, or the server refuses the login.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient> {
    let config = build_tiberius_config(opts);
    let port = opts.port_or_default();

    let tcp = if opts.instance_name.is_some() {
        // named instances publish their port through the SQL Browser service
        TcpStream::connect_named(&config)
            .await
            .map_err(|e| SqlModelError::Connection(format!("SQL Browser lookup error: {e}")))?
    } else {
        let server_addr = (opts.server.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| {
                SqlModelError::Connection(format!("Failed to resolve server address: {e}"))
            })?
            .next()
            .ok_or_else(|| {
                SqlModelError::Connection(format!("No valid address found for {}", opts.server))
            })?;
        TcpStream::connect(server_addr)
            .await
            .map_err(|e| SqlModelError::Connection(format!("TCP connection error: {e}")))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| SqlModelError::Connection(format!("TCP connection error: {e}")))?;

    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| SqlModelError::Connection(format!("SQL Server connection error: {e}")))?;
    debug!(server = %opts.server, port, database = %opts.database, "connected");
    Ok(client)
}
