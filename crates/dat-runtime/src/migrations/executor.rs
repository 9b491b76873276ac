use dat_core::error::ExecutionError;
use dat_core::script::{locate, BatchSplitter, DEFAULT_SEPARATOR};
use tracing::trace;

use crate::db::StatementExecutor;

/// Executes scripts batch by batch.
///
/// The executor never opens or closes a transaction: whatever executor it is
/// handed, a connection or a transaction, defines the scope.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    separator: String,
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl ScriptExecutor {
    /// Create an executor splitting on `separator`.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Run `script` against `conn`, returning how many batches were sent.
    ///
    /// Blank batches are skipped. A "no rows affected" signal counts as
    /// success and execution continues with the next batch. Any other error
    /// stops the script and reports the failing batch.
    pub async fn execute<E>(&self, conn: &mut E, script: &str) -> Result<usize, ExecutionError>
    where
        E: StatementExecutor + ?Sized,
    {
        let splitter = BatchSplitter::new(script, &self.separator);
        let mut executed = 0;

        for batch in splitter.batches() {
            if batch.trim().is_empty() {
                continue;
            }

            executed += 1;
            match conn.execute(batch).await {
                Ok(()) => {}
                Err(e) if e.is_no_rows_affected() => {
                    trace!("Batch {} affected no rows", executed);
                }
                Err(error) => {
                    let location = error.position().map(|offset| locate(batch, offset));
                    return Err(ExecutionError {
                        statement: batch.to_string(),
                        error,
                        location,
                    });
                }
            }
        }

        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDatabase;
    use dat_core::error::DbError;
    use dat_core::script::Location;

    #[tokio::test]
    async fn test_executes_batches_in_order() {
        let mut db = MemoryDatabase::new();
        let executed = ScriptExecutor::default()
            .execute(&mut db, "create table a (id int);\nGO\ncreate table b (id int);\n")
            .await
            .unwrap();

        assert_eq!(executed, 2);
        assert_eq!(
            db.statements(),
            vec!["create table a (id int);\n", "create table b (id int);\n"]
        );
        assert!(db.has_table("a"));
        assert!(db.has_table("b"));
    }

    #[tokio::test]
    async fn test_skips_blank_batches() {
        let mut db = MemoryDatabase::new();
        let executed = ScriptExecutor::default()
            .execute(&mut db, "GO\n  \n\nGO\nselect 1;\nGO\n")
            .await
            .unwrap();

        assert_eq!(executed, 1);
        assert_eq!(db.statements(), vec!["select 1;\n"]);
    }

    #[tokio::test]
    async fn test_custom_separator() {
        let mut db = MemoryDatabase::new();
        let executed = ScriptExecutor::new("--;;")
            .execute(&mut db, "select 1;\n--;;\nselect 2;\nGO\nselect 3;\n")
            .await
            .unwrap();

        assert_eq!(executed, 2);
        assert_eq!(db.statements()[1], "select 2;\nGO\nselect 3;\n");
    }

    #[tokio::test]
    async fn test_stops_at_first_error_with_location() {
        let mut db = MemoryDatabase::new();
        db.fail_on(
            "selec ",
            DbError::server("ERROR", "42601", "syntax error at or near \"selec\"").at_position(8),
        );

        let err = ScriptExecutor::default()
            .execute(
                &mut db,
                "create table a (id int);\nGO\n-- bad\nselec 1;\nGO\ncreate table b (id int);\n",
            )
            .await
            .unwrap_err();

        assert_eq!(err.statement, "-- bad\nselec 1;\n");
        assert_eq!(err.location, Some(Location { line: 2, column: 2 }));
        assert!(err.to_string().contains("at line=2 col=2"));
        assert!(db.has_table("a"));
        assert!(!db.has_table("b"));
    }

    #[tokio::test]
    async fn test_error_without_position_has_no_location() {
        let mut db = MemoryDatabase::new();
        db.fail_on("boom", DbError::server("ERROR", "P0001", "boom"));

        let err = ScriptExecutor::default()
            .execute(&mut db, "select boom();")
            .await
            .unwrap_err();
        assert_eq!(err.location, None);
        assert_eq!(err.to_string(), "[ERROR=P0001] boom");
    }

    // "No rows affected" is absorbed per batch. Whether it should instead end
    // the script is unresolved; this pins the per-batch behaviour.
    #[tokio::test]
    async fn test_no_rows_affected_continues_with_next_batch() {
        let mut db = MemoryDatabase::new();
        db.fail_on("delete from missing", DbError::NoRowsAffected);

        let executed = ScriptExecutor::default()
            .execute(
                &mut db,
                "delete from missing where false;\nGO\ncreate table after (id int);\n",
            )
            .await
            .unwrap();

        assert_eq!(executed, 2);
        assert!(db.has_table("after"));
    }
}
