//! Migration runner.
//!
//! Checks the local migrations against the ledger, then applies every
//! pending migration in ascending name order, stopping at the first failure.
//! Per migration: the optional notx script runs on the bare connection, then
//! the up script and the ledger row share one transaction.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use dat_core::config::DatConfig;
use dat_core::error::{DatError, Drift, ExecutionError, Result};
use dat_core::migration::{pending, verify, NO_TX_SCRIPT, UP_SCRIPT};
use dat_core::{AppliedMigration, LedgerTable, Migration};

use super::executor::ScriptExecutor;
use super::report::Reporter;
use super::source::{read_optional, MigrationSource};
use crate::db::{LedgerTransaction, MigrationConnection, StatementExecutor};

/// Where a migration is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Discovered,
    NoTxApplied,
    UpApplied,
    Recorded,
    Failed,
}

/// Outcome of [`MigrationRunner::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Migrations already in the ledger.
    pub skipped: usize,
}

/// Applied and pending migrations plus any drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<String>,
    pub drift: Vec<Drift>,
}

/// Migration runner over a single connection.
pub struct MigrationRunner {
    source: MigrationSource,
    executor: ScriptExecutor,
    ledger: LedgerTable,
    init_script: Option<PathBuf>,
    reporter: Arc<dyn Reporter>,
}

impl MigrationRunner {
    pub fn new(
        source: MigrationSource,
        executor: ScriptExecutor,
        ledger: LedgerTable,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            executor,
            ledger,
            init_script: None,
            reporter,
        }
    }

    /// Build a runner from configuration.
    pub fn from_config(config: &DatConfig, reporter: Arc<dyn Reporter>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            MigrationSource::new(&config.migrations_dir),
            ScriptExecutor::new(config.batch_separator.clone()),
            config.ledger()?,
            reporter,
        )
        .with_init_script(config.init_script()))
    }

    /// Script to run once when the ledger table is created.
    pub fn with_init_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.init_script = Some(path.into());
        self
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    /// Make sure the ledger table exists.
    ///
    /// When the table had to be created and an init script exists, the init
    /// script runs outside a transaction. Returns whether the table was created.
    pub async fn bootstrap<C: MigrationConnection>(&self, conn: &mut C) -> Result<bool> {
        let created = conn.ensure_ledger(&self.ledger).await?;
        if !created {
            return Ok(false);
        }
        info!("Created ledger table {}", self.ledger.quoted());

        if let Some(path) = &self.init_script {
            if let Some(script) = read_optional(path).await? {
                let label = path.display().to_string();
                self.run_script(conn, &label, &script)
                    .await
                    .map_err(|source| DatError::Execution {
                        migration: label.clone(),
                        source,
                    })?;
            }
        }
        Ok(true)
    }

    /// Report applied, pending and drifted migrations.
    ///
    /// Bootstraps the ledger first, like [`MigrationRunner::run`], so on a
    /// fresh database this creates the ledger table and runs the init script.
    /// No migration is applied.
    pub async fn status<C: MigrationConnection>(&self, conn: &mut C) -> Result<MigrationStatus> {
        self.bootstrap(conn).await?;
        let local = self.source.partial_migrations()?;
        let applied = conn.applied(&self.ledger).await?;

        let drift = match verify(&local, &applied) {
            Ok(()) => Vec::new(),
            Err(err) => err.violations,
        };
        let pending = pending(&local, &applied)
            .into_iter()
            .map(|m| m.name().to_string())
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            drift,
        })
    }

    /// Run all pending migrations.
    ///
    /// Fails before executing anything when the local migrations have drifted
    /// from the ledger. Otherwise stops at the first migration that fails.
    pub async fn run<C: MigrationConnection>(&self, conn: &mut C) -> Result<RunSummary> {
        self.bootstrap(conn).await?;

        let local = self.source.partial_migrations()?;
        let applied = conn.applied(&self.ledger).await?;
        debug!("Already applied migrations: {}", applied.len());

        if let Err(err) = verify(&local, &applied) {
            self.reporter.drift(&err);
            return Err(err.into());
        }

        let pending: Vec<Migration> = pending(&local, &applied).into_iter().cloned().collect();
        if pending.is_empty() {
            info!("No pending migrations");
        }

        let mut summary = RunSummary {
            applied: Vec::with_capacity(pending.len()),
            skipped: applied.len(),
        };
        for migration in pending {
            let name = migration.name().to_string();
            self.apply(conn, migration).await?;
            summary.applied.push(name);
        }

        Ok(summary)
    }

    /// Apply one migration: notx script, then up script and ledger row in a
    /// single transaction.
    pub async fn apply<C: MigrationConnection>(&self, conn: &mut C, migration: Migration) -> Result<()> {
        let name = migration.name().to_string();
        transition(&name, MigrationState::Discovered);

        let migration = match self.source.load_scripts(migration).await {
            Ok(migration) => migration,
            Err(e) => {
                transition(&name, MigrationState::Failed);
                return Err(e);
            }
        };
        info!("Applying migration: {}", name);

        let mut no_tx_applied = false;
        if let Some(script) = &migration.no_tx_script {
            let label = self.label(&migration, NO_TX_SCRIPT);
            if let Err(source) = self.run_script(conn, &label, script).await {
                transition(&name, MigrationState::Failed);
                return Err(DatError::Execution {
                    migration: name,
                    source,
                });
            }
            no_tx_applied = true;
            transition(&name, MigrationState::NoTxApplied);
        }

        match self.apply_transactional(conn, &migration).await {
            Ok(()) => {
                transition(&name, MigrationState::Recorded);
                info!("Migration applied: {}", name);
                Ok(())
            }
            Err(e) => {
                transition(&name, MigrationState::Failed);
                if no_tx_applied {
                    Err(DatError::NoTxResidue {
                        migration: name,
                        source: Box::new(e),
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn apply_transactional<C: MigrationConnection>(
        &self,
        conn: &mut C,
        migration: &Migration,
    ) -> Result<()> {
        let name = migration.name().to_string();
        let entry = migration.to_entry().ok_or_else(|| {
            DatError::Discovery(format!("Migration {} has no {}", name, UP_SCRIPT))
        })?;

        // The transaction rolls back when dropped on any early return below.
        let mut tx = conn.begin().await?;

        let label = self.label(migration, UP_SCRIPT);
        self.run_script(&mut tx, &label, &entry.up_script)
            .await
            .map_err(|source| DatError::Execution {
                migration: name.clone(),
                source,
            })?;
        transition(&name, MigrationState::UpApplied);

        tx.record(&self.ledger, &entry)
            .await
            .map_err(|source| DatError::Persistence {
                migration: name.clone(),
                source,
            })?;
        tx.commit().await.map_err(|source| DatError::Persistence {
            migration: name,
            source,
        })?;

        Ok(())
    }

    /// Run a script, reporting the attempt and its outcome.
    async fn run_script<E>(
        &self,
        conn: &mut E,
        label: &str,
        script: &str,
    ) -> std::result::Result<(), ExecutionError>
    where
        E: StatementExecutor + ?Sized,
    {
        self.reporter.attempt(label);
        match self.executor.execute(conn, script).await {
            Ok(_) => {
                self.reporter.succeeded(label);
                Ok(())
            }
            Err(e) => {
                self.reporter.failed(label, &e.to_string());
                Err(e)
            }
        }
    }

    fn label(&self, migration: &Migration, file: &str) -> String {
        self.source.script_path(migration, file).display().to_string()
    }
}

fn transition(migration: &str, state: MigrationState) {
    debug!(migration, state = ?state, "migration state");
}
