pub mod config;
pub mod error;
pub mod migration;
pub mod script;
pub mod sql;

pub use config::{ConnectionConfig, DatConfig};
pub use error::{DatError, DbError, Drift, ExecutionError, ReconciliationError, Result};
pub use migration::{AppliedMigration, LedgerEntry, Migration, MigrationName};
pub use script::{locate, BatchSplitter, Location};
pub use sql::LedgerTable;
