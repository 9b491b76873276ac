mod drop;
mod migrate;
mod new;
mod sprocs;

pub use drop::DropCommand;
pub use migrate::{MigrateCommand, StatusCommand};
pub use new::NewCommand;
pub use sprocs::SprocsCommand;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use dat_core::{ConnectionConfig, DatConfig};
use dat_runtime::{connect_options, PgMigrationConnection};

/// dat - directory-based SQL migrations for PostgreSQL
#[derive(Parser)]
#[command(name = "dat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Migrations directory, also holding dat.toml.
    #[arg(short, long, env = "DAT_DIR", default_value = "migrations", global = true)]
    pub dir: PathBuf,

    /// Run environment, selects the dat-<env>.toml overlay.
    #[arg(short, long, env = "RUN_ENV", global = true)]
    pub env: Option<String>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending migrations.
    #[command(alias = "up")]
    Migrate(MigrateCommand),

    /// Show applied and pending migrations.
    Status(StatusCommand),

    /// Scaffold a new migration.
    New(NewCommand),

    /// Re-apply stored procedures.
    Sprocs(SprocsCommand),

    /// Drop the database and its user.
    Drop(DropCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        init_tracing(&self.global);

        let config = DatConfig::load(&self.global.dir, self.global.env.as_deref())
            .with_context(|| format!("Failed to load configuration from {:?}", self.global.dir))?;
        debug!("Loaded configuration for {:?}", config.migrations_dir);

        match self.command {
            Commands::Migrate(cmd) => cmd.execute(config).await,
            Commands::Status(cmd) => cmd.execute(config).await,
            Commands::New(cmd) => cmd.execute(config),
            Commands::Sprocs(cmd) => cmd.execute(config).await,
            Commands::Drop(cmd) => cmd.execute(config).await,
        }
    }
}

fn init_tracing(args: &GlobalArgs) {
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Database name a connection targets, taking a url-only configuration into account.
fn database_name(connection: &ConnectionConfig) -> String {
    connect_options(connection)
        .ok()
        .and_then(|options| options.get_database().map(str::to_string))
        .unwrap_or_else(|| connection.database.clone())
}

/// Open the single connection a command runs on.
async fn connect(connection: &ConnectionConfig) -> Result<PgMigrationConnection> {
    let conn = PgMigrationConnection::connect(connection)
        .await
        .with_context(|| {
            let target = connect_options(connection)
                .map(|options| format!("{}:{}", options.get_host(), options.get_port()))
                .unwrap_or_else(|_| format!("{}:{}", connection.host, connection.port));
            format!("Failed to connect to {} on {}", database_name(connection), target)
        })?;
    Ok(conn)
}

/// Close a connection, logging rather than masking the command's own result.
async fn close(conn: PgMigrationConnection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_from_url_only_config() {
        let connection = ConnectionConfig {
            url: Some("postgres://app:pw@db.local/appdb".into()),
            ..Default::default()
        };
        assert_eq!(database_name(&connection), "appdb");

        let connection = ConnectionConfig {
            database: "app".into(),
            ..Default::default()
        };
        assert_eq!(database_name(&connection), "app");
    }

    #[test]
    fn test_cli_parse_migrate() {
        let cli = Cli::try_parse_from(["dat", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate(_)));
    }

    #[test]
    fn test_cli_parse_up_alias() {
        let cli = Cli::try_parse_from(["dat", "up"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate(_)));
    }

    #[test]
    fn test_cli_parse_global_args_after_command() {
        let cli = Cli::try_parse_from(["dat", "status", "--json", "--dir", "db", "--env", "production"])
            .unwrap();
        assert_eq!(cli.global.dir, PathBuf::from("db"));
        assert_eq!(cli.global.env.as_deref(), Some("production"));
        match cli.command {
            Commands::Status(cmd) => assert!(cmd.json),
            _ => panic!("expected status"),
        }
    }

    #[test]
    fn test_cli_parse_new_title_words() {
        let cli = Cli::try_parse_from(["dat", "new", "Add", "users", "table"]).unwrap();
        match cli.command {
            Commands::New(cmd) => assert_eq!(cmd.title(), "Add users table"),
            _ => panic!("expected new"),
        }
    }

    #[test]
    fn test_cli_parse_new_requires_title() {
        assert!(Cli::try_parse_from(["dat", "new"]).is_err());
    }

    #[test]
    fn test_cli_parse_drop() {
        let cli = Cli::try_parse_from([
            "dat",
            "drop",
            "--yes",
            "--super-user",
            "admin",
            "--super-password",
            "secret",
        ])
        .unwrap();
        match cli.command {
            Commands::Drop(cmd) => {
                assert!(cmd.yes);
                assert_eq!(cmd.super_user.as_deref(), Some("admin"));
                assert_eq!(cmd.super_password, "secret");
            }
            _ => panic!("expected drop"),
        }
    }
}
