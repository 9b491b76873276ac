use std::str::FromStr;

use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgDatabaseError, PgErrorPosition, PgSeverity, PgSslMode,
};
use sqlx::{Connection, Postgres, Row, Transaction};
use tracing::debug;

use dat_core::config::ConnectionConfig;
use dat_core::error::{DatError, DbError, Result};
use dat_core::{AppliedMigration, LedgerEntry, LedgerTable};

use super::{BoxFuture, LedgerTransaction, MigrationConnection, StatementExecutor};

/// Build connect options from configuration.
///
/// Starts from `url` when present; explicit database, user and password
/// override the matching parts of it.
pub fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions> {
    let mut options = match &config.url {
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| DatError::Config(format!("Invalid connection url: {}", e)))?,
        None => PgConnectOptions::new().host(&config.host).port(config.port),
    };

    if !config.database.is_empty() {
        options = options.database(&config.database);
    }
    if !config.user.is_empty() {
        options = options.username(&config.user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    for (key, value) in config.extra_pairs() {
        options = match key.as_str() {
            "sslmode" => {
                let mode = PgSslMode::from_str(&value)
                    .map_err(|e| DatError::Config(format!("Invalid sslmode {:?}: {}", value, e)))?;
                options.ssl_mode(mode)
            }
            "application_name" => options.application_name(&value),
            _ => options.options([(key.as_str(), value.as_str())]),
        };
    }

    Ok(options)
}

/// Map a driver error to the structured database error.
pub(crate) fn db_error(error: sqlx::Error) -> DbError {
    match &error {
        sqlx::Error::Database(db) => match db.try_downcast_ref::<PgDatabaseError>() {
            Some(pg) => DbError::Server {
                severity: severity_label(pg.severity()).to_string(),
                code: pg.code().to_string(),
                message: pg.message().to_string(),
                position: match pg.position() {
                    Some(PgErrorPosition::Original(position)) => Some(position),
                    _ => None,
                },
            },
            None => DbError::Server {
                severity: "ERROR".to_string(),
                code: db.code().map(|c| c.into_owned()).unwrap_or_default(),
                message: db.message().to_string(),
                position: None,
            },
        },
        _ => DbError::Driver(error.to_string()),
    }
}

fn severity_label(severity: PgSeverity) -> &'static str {
    match severity {
        PgSeverity::Panic => "PANIC",
        PgSeverity::Fatal => "FATAL",
        PgSeverity::Error => "ERROR",
        PgSeverity::Warning => "WARNING",
        PgSeverity::Notice => "NOTICE",
        PgSeverity::Debug => "DEBUG",
        PgSeverity::Info => "INFO",
        PgSeverity::Log => "LOG",
    }
}

/// A single PostgreSQL connection used for a whole migration run.
pub struct PgMigrationConnection {
    conn: PgConnection,
}

impl PgMigrationConnection {
    /// Connect using configuration.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(config)?;
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| DbError::Driver(format!("Failed to connect: {}", e)))?;
        debug!("Connected to {}", options.get_database().unwrap_or("postgres"));
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(db_error)?;
        Ok(())
    }
}

impl StatementExecutor for PgMigrationConnection {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, std::result::Result<(), DbError>> {
        Box::pin(async move {
            sqlx::raw_sql(statement)
                .execute(&mut self.conn)
                .await
                .map(|_| ())
                .map_err(db_error)
        })
    }
}

impl MigrationConnection for PgMigrationConnection {
    type Transaction<'t> = PgLedgerTransaction<'t>
    where
        Self: 't;

    fn begin(&mut self) -> BoxFuture<'_, std::result::Result<PgLedgerTransaction<'_>, DbError>> {
        Box::pin(async move {
            let tx = self.conn.begin().await.map_err(db_error)?;
            Ok(PgLedgerTransaction { tx })
        })
    }

    fn ensure_ledger<'a>(
        &'a mut self,
        table: &'a LedgerTable,
    ) -> BoxFuture<'a, std::result::Result<bool, DbError>> {
        Box::pin(async move {
            let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(table.quoted())
                .fetch_one(&mut self.conn)
                .await
                .map_err(db_error)?;
            if exists {
                return Ok(false);
            }

            let create = table.create_statement();
            sqlx::raw_sql(&create)
                .execute(&mut self.conn)
                .await
                .map_err(db_error)?;
            Ok(true)
        })
    }

    fn applied<'a>(
        &'a mut self,
        table: &'a LedgerTable,
    ) -> BoxFuture<'a, std::result::Result<Vec<AppliedMigration>, DbError>> {
        Box::pin(async move {
            let select = table.select_statement();
            let rows = sqlx::query(&select)
                .fetch_all(&mut self.conn)
                .await
                .map_err(db_error)?;

            rows.iter()
                .map(|row| {
                    Ok(AppliedMigration {
                        name: row.try_get("name")?,
                        applied_at: row.try_get("applied_at")?,
                        has_down: row.try_get("has_down")?,
                    })
                })
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
                .map_err(db_error)
        })
    }
}

/// Transaction on a [`PgMigrationConnection`]. Rolls back on drop.
pub struct PgLedgerTransaction<'c> {
    tx: Transaction<'c, Postgres>,
}

impl StatementExecutor for PgLedgerTransaction<'_> {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, std::result::Result<(), DbError>> {
        Box::pin(async move {
            sqlx::raw_sql(statement)
                .execute(&mut *self.tx)
                .await
                .map(|_| ())
                .map_err(db_error)
        })
    }
}

impl LedgerTransaction for PgLedgerTransaction<'_> {
    fn record<'a>(
        &'a mut self,
        table: &'a LedgerTable,
        entry: &'a LedgerEntry,
    ) -> BoxFuture<'a, std::result::Result<(), DbError>> {
        Box::pin(async move {
            let insert = table.insert_statement();
            sqlx::query(&insert)
                .bind(&entry.name)
                .bind(&entry.up_script)
                .bind(&entry.down_script)
                .bind(&entry.no_tx_script)
                .execute(&mut *self.tx)
                .await
                .map(|_| ())
                .map_err(db_error)
        })
    }

    fn commit<'t>(self) -> BoxFuture<'t, std::result::Result<(), DbError>>
    where
        Self: Sized + 't,
    {
        Box::pin(async move { self.tx.commit().await.map_err(db_error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_from_fields() {
        let config = ConnectionConfig {
            host: "db.local".into(),
            port: 6543,
            database: "app".into(),
            user: "app".into(),
            password: Some("pw".into()),
            extra_params: Some("sslmode=disable&application_name=dat".into()),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("app"));
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_application_name(), Some("dat"));
    }

    #[test]
    fn test_fields_override_url() {
        let config = ConnectionConfig {
            url: Some("postgres://app:pw@db.local:5433/app".into()),
            database: "postgres".into(),
            user: "postgres".into(),
            ..Default::default()
        };
        let options = connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("postgres"));
        assert_eq!(options.get_username(), "postgres");
    }

    #[test]
    fn test_invalid_sslmode() {
        let config = ConnectionConfig {
            database: "app".into(),
            user: "app".into(),
            extra_params: Some("sslmode=sometimes".into()),
            ..Default::default()
        };
        assert!(matches!(
            connect_options(&config),
            Err(DatError::Config(_))
        ));
    }

    #[test]
    fn test_non_database_errors_are_driver_errors() {
        let err = db_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Driver(_)));
    }

    #[test]
    fn test_row_not_found_is_not_no_rows_affected() {
        let err = db_error(sqlx::Error::RowNotFound);
        assert!(!err.is_no_rows_affected());
        assert!(matches!(err, DbError::Driver(_)));
    }

    fn assert_migration_connection<C: MigrationConnection>() {}

    fn assert_ledger_transaction<T: LedgerTransaction>() {}

    #[test]
    fn test_adapter_implements_connection_seams() {
        assert_migration_connection::<PgMigrationConnection>();
        assert_ledger_transaction::<PgLedgerTransaction<'static>>();
    }
}
