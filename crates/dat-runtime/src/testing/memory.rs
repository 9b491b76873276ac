//! In-memory stand-in for a migration connection.

use std::collections::BTreeSet;

use dat_core::error::DbError;
use dat_core::{AppliedMigration, LedgerEntry, LedgerTable};

use crate::db::{BoxFuture, LedgerTransaction, MigrationConnection, StatementExecutor};

/// Something that became durable in a [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    /// A statement executed outside a transaction or committed with one.
    Statement(String),
    /// A ledger row committed for the named migration.
    Recorded(String),
}

/// In-memory database for tests.
///
/// Statements run outside a transaction are durable immediately.
/// Transactional statements and ledger rows are buffered and only applied on
/// commit. Dropping a transaction without committing discards them and
/// counts a rollback. `create table` and `drop table` statements are tracked
/// so tests can check which tables exist.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    events: Vec<MemoryEvent>,
    tables: BTreeSet<String>,
    ledger: Option<Vec<LedgerEntry>>,
    failures: Vec<(String, DbError)>,
    record_failure: Option<DbError>,
    commit_failure: Option<DbError>,
    commits: usize,
    rollbacks: usize,
}

impl MemoryDatabase {
    /// Create an empty database without a ledger table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database whose ledger already holds `names`.
    pub fn with_ledger<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| LedgerEntry {
                name: name.into(),
                up_script: String::new(),
                down_script: None,
                no_tx_script: None,
            })
            .collect();
        Self {
            ledger: Some(entries),
            ..Self::default()
        }
    }

    /// Fail every statement containing `pattern` with `error`.
    pub fn fail_on(&mut self, pattern: impl Into<String>, error: DbError) {
        self.failures.push((pattern.into(), error));
    }

    /// Fail every ledger insert with `error`.
    pub fn fail_record(&mut self, error: DbError) {
        self.record_failure = Some(error);
    }

    /// Fail every commit with `error`.
    pub fn fail_commit(&mut self, error: DbError) {
        self.commit_failure = Some(error);
    }

    /// Durable events in the order they became durable.
    pub fn events(&self) -> &[MemoryEvent] {
        &self.events
    }

    /// Durable statements in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                MemoryEvent::Statement(sql) => Some(sql.clone()),
                MemoryEvent::Recorded(_) => None,
            })
            .collect()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(&name.to_lowercase())
    }

    /// Committed ledger rows, or nothing when the ledger table is missing.
    pub fn ledger(&self) -> &[LedgerEntry] {
        self.ledger.as_deref().unwrap_or(&[])
    }

    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn check(&self, statement: &str) -> Result<(), DbError> {
        match self
            .failures
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
        {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl StatementExecutor for MemoryDatabase {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<(), DbError>> {
        Box::pin(async move {
            self.check(statement)?;
            apply_ddl(&mut self.tables, statement);
            self.events.push(MemoryEvent::Statement(statement.to_string()));
            Ok(())
        })
    }
}

impl MigrationConnection for MemoryDatabase {
    type Transaction<'t> = MemoryTransaction<'t>
    where
        Self: 't;

    fn begin(&mut self) -> BoxFuture<'_, Result<MemoryTransaction<'_>, DbError>> {
        Box::pin(async move {
            let tables = self.tables.clone();
            Ok(MemoryTransaction {
                db: self,
                events: Vec::new(),
                tables,
                entries: Vec::new(),
                committed: false,
            })
        })
    }

    fn ensure_ledger<'a>(&'a mut self, _table: &'a LedgerTable) -> BoxFuture<'a, Result<bool, DbError>> {
        Box::pin(async move {
            if self.ledger.is_some() {
                return Ok(false);
            }
            self.ledger = Some(Vec::new());
            Ok(true)
        })
    }

    fn applied<'a>(
        &'a mut self,
        _table: &'a LedgerTable,
    ) -> BoxFuture<'a, Result<Vec<AppliedMigration>, DbError>> {
        Box::pin(async move {
            let ledger = self.ledger.as_ref().ok_or_else(missing_ledger)?;
            let mut applied: Vec<AppliedMigration> = ledger
                .iter()
                .map(|entry| AppliedMigration {
                    name: entry.name.clone(),
                    applied_at: None,
                    has_down: entry.down_script.is_some(),
                })
                .collect();
            applied.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(applied)
        })
    }
}

/// Transaction on a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    db: &'a mut MemoryDatabase,
    events: Vec<MemoryEvent>,
    tables: BTreeSet<String>,
    entries: Vec<LedgerEntry>,
    committed: bool,
}

impl StatementExecutor for MemoryTransaction<'_> {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<(), DbError>> {
        Box::pin(async move {
            self.db.check(statement)?;
            apply_ddl(&mut self.tables, statement);
            self.events.push(MemoryEvent::Statement(statement.to_string()));
            Ok(())
        })
    }
}

impl LedgerTransaction for MemoryTransaction<'_> {
    fn record<'a>(
        &'a mut self,
        _table: &'a LedgerTable,
        entry: &'a LedgerEntry,
    ) -> BoxFuture<'a, Result<(), DbError>> {
        Box::pin(async move {
            if let Some(error) = &self.db.record_failure {
                return Err(error.clone());
            }
            let ledger = self.db.ledger.as_ref().ok_or_else(missing_ledger)?;
            if ledger
                .iter()
                .chain(self.entries.iter())
                .any(|existing| existing.name == entry.name)
            {
                return Err(DbError::server(
                    "ERROR",
                    "23505",
                    format!("duplicate key value violates unique constraint, name={}", entry.name),
                ));
            }

            self.entries.push(entry.clone());
            self.events.push(MemoryEvent::Recorded(entry.name.clone()));
            Ok(())
        })
    }

    fn commit<'t>(self) -> BoxFuture<'t, Result<(), DbError>>
    where
        Self: Sized + 't,
    {
        Box::pin(async move {
            let mut tx = self;
            if let Some(error) = &tx.db.commit_failure {
                return Err(error.clone());
            }

            let events = std::mem::take(&mut tx.events);
            let entries = std::mem::take(&mut tx.entries);
            tx.db.tables = std::mem::take(&mut tx.tables);
            tx.db.events.extend(events);
            tx.db.ledger.get_or_insert_with(Vec::new).extend(entries);
            tx.db.commits += 1;
            tx.committed = true;
            Ok(())
        })
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.db.rollbacks += 1;
        }
    }
}

fn missing_ledger() -> DbError {
    DbError::server("ERROR", "42P01", "relation for the ledger does not exist")
}

/// Track `create table` and `drop table` commands in `statement`.
fn apply_ddl(tables: &mut BTreeSet<String>, statement: &str) {
    for command in statement.split(';') {
        let words: Vec<String> = command
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["create", "table", "if", "not", "exists", name, ..]
            | ["create", "table", name, ..] => {
                tables.insert(table_name(name));
            }
            ["drop", "table", "if", "exists", name, ..] | ["drop", "table", name, ..] => {
                tables.remove(&table_name(name));
            }
            _ => {}
        }
    }
}

fn table_name(word: &str) -> String {
    word.split('(')
        .next()
        .unwrap_or(word)
        .trim_matches('"')
        .to_string()
}
