//! Database seams used by the script executor and the migration runner.
//!
//! Everything runs on one connection, one statement at a time. A
//! transaction handle rolls back when dropped without a successful commit.

mod postgres;

pub use postgres::{connect_options, PgMigrationConnection, PgLedgerTransaction};

use std::future::Future;
use std::pin::Pin;

use dat_core::error::DbError;
use dat_core::{AppliedMigration, LedgerEntry, LedgerTable};

/// Boxed future returned by the connection traits.
///
/// Not `Send`: sqlx's higher-ranked `Executor` bound on `&mut PgConnection`
/// cannot be proven for these futures, and they are only ever awaited in place.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Something that can run a single batch of SQL.
pub trait StatementExecutor: Send {
    /// Execute `statement`, which may hold several SQL commands.
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<(), DbError>>;
}

/// An open transaction that can record a ledger row.
///
/// Dropping it without calling [`LedgerTransaction::commit`] rolls back.
pub trait LedgerTransaction: StatementExecutor {
    /// Insert one ledger row.
    fn record<'a>(
        &'a mut self,
        table: &'a LedgerTable,
        entry: &'a LedgerEntry,
    ) -> BoxFuture<'a, Result<(), DbError>>;

    /// Commit everything executed and recorded in this transaction.
    fn commit<'t>(self) -> BoxFuture<'t, Result<(), DbError>>
    where
        Self: Sized + 't;
}

/// A live connection to the target database.
pub trait MigrationConnection: StatementExecutor {
    type Transaction<'t>: LedgerTransaction + 't
    where
        Self: 't;

    /// Begin a transaction borrowing this connection.
    fn begin(&mut self) -> BoxFuture<'_, Result<Self::Transaction<'_>, DbError>>;

    /// Create the ledger table if missing. Returns true when it was created.
    fn ensure_ledger<'a>(&'a mut self, table: &'a LedgerTable) -> BoxFuture<'a, Result<bool, DbError>>;

    /// Ledger rows in ascending name order.
    fn applied<'a>(
        &'a mut self,
        table: &'a LedgerTable,
    ) -> BoxFuture<'a, Result<Vec<AppliedMigration>, DbError>>;
}
