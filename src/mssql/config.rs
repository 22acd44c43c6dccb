use tiberius::{AuthMethod, Config as TiberiusConfig};

use super::connection::MssqlConnection;
use crate::error::{Result, SqlModelError};

pub const DEFAULT_PORT: u16 = 1433;

/// Options for connecting to SQL Server.
#[derive(Clone)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub trust_cert: bool,
}

impl std::fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("instance_name", &self.instance_name)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            trust_cert: true,
        }
    }

    #[must_use]
    pub fn builder(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server.into(), database.into(), user.into(), password.into())
    }

    /// Read options from `MSSQL_HOST`, `MSSQL_DATABASE`, `MSSQL_USER`, `MSSQL_PASSWORD`,
    /// and the optional `MSSQL_PORT` and `MSSQL_INSTANCE`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Config`] when a required variable is missing or the port is
    /// not a number.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| SqlModelError::Config(format!("{key} is not set")))
        };
        let port = match lookup("MSSQL_PORT") {
            None => None,
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                SqlModelError::Config(format!("MSSQL_PORT {raw:?} is not a port: {e}"))
            })?),
        };
        Ok(Self::new(
            required("MSSQL_HOST")?,
            required("MSSQL_DATABASE")?,
            required("MSSQL_USER")?,
            required("MSSQL_PASSWORD")?,
        )
        .with_port(port)
        .with_instance_name(lookup("MSSQL_INSTANCE")))
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            opts: MssqlOptions::new(server, database, user, password),
        }
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn instance_name(mut self, instance_name: Option<String>) -> Self {
        self.opts.instance_name = instance_name;
        self
    }

    #[must_use]
    pub fn trust_cert(mut self, trust_cert: bool) -> Self {
        self.opts.trust_cert = trust_cert;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }

    /// Open a connection with the finished options.
    ///
    /// # Errors
    ///
    /// Returns [`SqlModelError::Connection`] if the server cannot be reached or refuses
    /// the login.
    pub async fn connect(self) -> Result<MssqlConnection> {
        MssqlConnection::connect(&self.finish()).await
    }
}

pub(crate) fn build_tiberius_config(opts: &MssqlOptions) -> TiberiusConfig {
    let mut config = TiberiusConfig::new();
    config.host(&opts.server);
    config.database(&opts.database);
    config.port(opts.port_or_default());
    config.authentication(AuthMethod::sql_server(&opts.user, &opts.password));
    if let Some(instance) = &opts.instance_name {
        config.instance_name(instance);
    }
    if opts.trust_cert {
        config.trust_cert();
    }
    config
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn reads_required_and_optional_variables() {
        let vars = env(&[
            ("MSSQL_HOST", "db.local"),
            ("MSSQL_DATABASE", "People"),
            ("MSSQL_USER", "sa"),
            ("MSSQL_PASSWORD", "secret"),
            ("MSSQL_PORT", "14330"),
        ]);
        let opts = MssqlOptions::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(opts.server, "db.local");
        assert_eq!(opts.port_or_default(), 14330);
        assert_eq!(opts.instance_name, None);
        assert!(!format!("{opts:?}").contains("secret"));
    }

    #[test]
    fn missing_or_malformed_variables_are_config_errors() {
        let vars = env(&[("MSSQL_HOST", "db.local")]);
        let err = MssqlOptions::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: MSSQL_DATABASE is not set");

        let vars = env(&[
            ("MSSQL_HOST", "h"),
            ("MSSQL_DATABASE", "d"),
            ("MSSQL_USER", "u"),
            ("MSSQL_PASSWORD", "p"),
            ("MSSQL_PORT", "not-a-port"),
        ]);
        let err = MssqlOptions::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, SqlModelError::Config(_)));
    }

    #[test]
    fn builder_defaults_port() {
        let opts = MssqlOptions::builder("h", "d", "u", "p")
            .instance_name(Some("SQLEXPRESS".into()))
            .finish();
        assert_eq!(opts.port_or_default(), DEFAULT_PORT);
        assert!(opts.trust_cert);
    }
}
