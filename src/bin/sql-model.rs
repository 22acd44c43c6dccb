use clap::{Args, Parser, Subcommand};
use serde_json::{Value as JsonValue, json};
use tracing_subscriber::EnvFilter;

use sql_model::mssql::{MssqlConnection, MssqlOptions};
use sql_model::{QueryOutcome, RowValues, Session, SqlModelError};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Discover SQL Server tables as models, call procedures, run queries"
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    #[arg(long, env = "MSSQL_HOST")]
    host: String,
    #[arg(long, env = "MSSQL_DATABASE")]
    database: String,
    #[arg(long, env = "MSSQL_USER")]
    user: String,
    #[arg(long, env = "MSSQL_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, env = "MSSQL_PORT")]
    port: Option<u16>,
    #[arg(long, env = "MSSQL_INSTANCE")]
    instance: Option<String>,
    /// Verify the server certificate instead of trusting it.
    #[arg(long)]
    verify_cert: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the discovered definition of each table as JSON.
    Describe {
        #[arg(required = true)]
        tables: Vec<String>,
        /// Model names, one per table. Defaults to the table names.
        #[arg(long = "model")]
        models: Vec<String>,
    },
    /// Call a stored procedure. Arguments are JSON scalars; anything else is passed as text.
    Proc {
        name: String,
        args: Vec<String>,
    },
    /// Run a query without parameters and print its rows.
    Query { sql: String },
}

impl ConnectionArgs {
    fn options(&self) -> MssqlOptions {
        MssqlOptions::builder(&self.host, &self.database, &self.user, &self.password)
            .port(self.port)
            .instance_name(self.instance.clone())
            .trust_cert(!self.verify_cert)
            .finish()
    }
}

fn parse_argument(raw: &str) -> RowValues {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) if !(value.is_array() || value.is_object()) => RowValues::from_json(&value),
        _ => RowValues::Text(raw.to_string()),
    }
}

async fn run(cli: Cli) -> Result<JsonValue, SqlModelError> {
    let conn = MssqlConnection::connect(&cli.connection.options()).await?;
    let session = Session::new(conn);

    match cli.command {
        Command::Describe { tables, models } => {
            let models = if models.is_empty() { tables.clone() } else { models };
            let discovered = session.discover_model(tables, models.clone()).await?;
            let definitions = models
                .iter()
                .filter_map(|name| discovered.get(name))
                .map(|model| serde_json::to_value(model.definition().as_ref()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SqlModelError::Database(format!("cannot serialize definition: {e}")))?;
            Ok(JsonValue::Array(definitions))
        }
        Command::Proc { name, args } => {
            let args = args.iter().map(|a| parse_argument(a)).collect();
            let result = session.call_procedure(&name, args).await?;
            Ok(json!({
                "returnValue": result.return_value,
                "resultSets": result.result_sets.iter().map(|rs| rs.to_json()).collect::<Vec<_>>(),
            }))
        }
        Command::Query { sql } => Ok(match session.run_query(&sql, None).await? {
            QueryOutcome::Rows(rows) => rows.to_json(),
            QueryOutcome::RowsAffected(n) => json!({ "rowsAffected": n }),
        }),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            std::process::exit(if err.is_validation_class() { 2 } else { 1 });
        }
    }
}
