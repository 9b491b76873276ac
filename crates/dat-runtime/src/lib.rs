pub mod admin;
pub mod db;
pub mod migrations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use admin::drop_database;
pub use db::{connect_options, MigrationConnection, PgMigrationConnection, StatementExecutor};
pub use migrations::{
    MigrationRunner, MigrationSource, MigrationStatus, Reporter, RunSummary, ScriptExecutor,
    SprocRunner, TracingReporter,
};
