//! Stored procedure scripts.
//!
//! Sprocs are not versioned: every `*.sql` file in the sprocs directory is
//! re-applied on each run, all inside one transaction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use dat_core::error::{DatError, Result};
use dat_core::script::parse_sproc_name;

use super::executor::ScriptExecutor;
use super::report::Reporter;
use crate::db::{LedgerTransaction, MigrationConnection};

/// Applies the scripts of a sprocs directory.
pub struct SprocRunner {
    dir: PathBuf,
    executor: ScriptExecutor,
    reporter: Arc<dyn Reporter>,
}

impl SprocRunner {
    pub fn new(dir: impl Into<PathBuf>, executor: ScriptExecutor, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            dir: dir.into(),
            executor,
            reporter,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `*.sql` files in the directory, sorted by file name. A missing
    /// directory has none.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            debug!("Sprocs directory does not exist: {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Apply every sproc in one transaction.
    ///
    /// Returns the declared function names, falling back to the file name
    /// when a script declares none. Nothing is committed if any script fails.
    pub async fn run<C: MigrationConnection>(&self, conn: &mut C) -> Result<Vec<String>> {
        let files = self.files()?;
        if files.is_empty() {
            info!("No stored procedures in {:?}", self.dir);
            return Ok(Vec::new());
        }

        let mut scripts = Vec::with_capacity(files.len());
        for path in files {
            let body = tokio::fs::read_to_string(&path).await?;
            scripts.push((path, body));
        }

        let mut tx = conn.begin().await?;
        let mut applied = Vec::with_capacity(scripts.len());
        for (path, body) in &scripts {
            let label = path.display().to_string();
            self.reporter.attempt(&label);
            if let Err(source) = self.executor.execute(&mut tx, body).await {
                self.reporter.failed(&label, &source.to_string());
                return Err(DatError::Sproc { file: label, source });
            }
            self.reporter.succeeded(&label);

            let name = parse_sproc_name(body).unwrap_or_else(|| file_name(path));
            debug!("Applied sproc {}", name);
            applied.push(name);
        }
        tx.commit().await?;

        info!("Applied {} stored procedures", applied.len());
        Ok(applied)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_dat_err;
    use crate::testing::{MemoryDatabase, RecordingReporter};
    use dat_core::error::DbError;
    use std::fs;
    use tempfile::TempDir;

    fn sproc_runner(dir: &Path) -> SprocRunner {
        SprocRunner::new(dir, ScriptExecutor::default(), Arc::new(RecordingReporter::new()))
    }

    #[test]
    fn test_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.sql"), "").unwrap();
        fs::write(dir.path().join("a.sql"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();
        fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let files = sproc_runner(dir.path()).files().unwrap();
        assert_eq!(files, vec![dir.path().join("a.sql"), dir.path().join("b.sql")]);
    }

    #[tokio::test]
    async fn test_missing_directory_applies_nothing() {
        let mut db = MemoryDatabase::new();
        let applied = sproc_runner(Path::new("/nonexistent/sprocs"))
            .run(&mut db)
            .await
            .unwrap();
        assert!(applied.is_empty());
        assert_eq!(db.commits(), 0);
    }

    #[tokio::test]
    async fn test_applies_all_in_one_transaction() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.sql"),
            "create or replace function app.get_user(id int) returns int as $$ select id $$ language sql;",
        )
        .unwrap();
        fs::write(dir.path().join("b.sql"), "select 1;").unwrap();

        let mut db = MemoryDatabase::new();
        let applied = sproc_runner(dir.path()).run(&mut db).await.unwrap();

        assert_eq!(applied, vec!["app.get_user", "b.sql"]);
        assert_eq!(db.statements().len(), 2);
        assert_eq!(db.commits(), 1);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_every_sproc() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sql"), "create table kept (id int);").unwrap();
        fs::write(dir.path().join("b.sql"), "create function broken(").unwrap();

        let mut db = MemoryDatabase::new();
        db.fail_on("broken", DbError::server("ERROR", "42601", "syntax error"));

        let result = sproc_runner(dir.path()).run(&mut db).await;

        assert_dat_err!(result, DatError::Sproc { .. });
        assert!(db.statements().is_empty());
        assert!(!db.has_table("kept"));
        assert_eq!(db.rollbacks(), 1);
    }
}
