//! Administrative operations that need elevated credentials.

use tracing::{info, warn};

use dat_core::error::Result;
use dat_core::sql::drop_statements;

use crate::db::StatementExecutor;

/// Drop `database` and its owner `user`.
///
/// Other sessions on the database are terminated first. `conn` must be an
/// administrator connection to a different database, usually `postgres`.
pub async fn drop_database<E>(conn: &mut E, database: &str, user: &str) -> Result<()>
where
    E: StatementExecutor + ?Sized,
{
    warn!("Dropping database {} and user {}", database, user);
    for statement in drop_statements(database, user) {
        conn.execute(&statement).await?;
    }
    info!("Dropped database {}", database);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_dat_err;
    use crate::testing::MemoryDatabase;
    use dat_core::error::{DatError, DbError};

    #[tokio::test]
    async fn test_drop_runs_statements_in_order() {
        let mut db = MemoryDatabase::new();
        drop_database(&mut db, "app", "app_user").await.unwrap();

        let statements = db.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("pg_terminate_backend"));
        assert!(statements[0].contains("'app'"));
        assert_eq!(statements[1], "DROP DATABASE IF EXISTS \"app\"");
        assert_eq!(statements[2], "DROP USER IF EXISTS \"app_user\"");
    }

    #[tokio::test]
    async fn test_drop_stops_on_error() {
        let mut db = MemoryDatabase::new();
        db.fail_on(
            "DROP DATABASE",
            DbError::server("ERROR", "55006", "database \"app\" is being accessed by other users"),
        );

        let result = drop_database(&mut db, "app", "app_user").await;

        assert_dat_err!(result, DatError::Database(_));
        assert_eq!(db.statements().len(), 1);
    }
}
