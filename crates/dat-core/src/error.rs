use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::migration::NameError;
use crate::script::Location;

/// Core error type for dat operations.
#[derive(Error, Debug)]
pub enum DatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Invalid migration name: {0}")]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("Migration {migration} failed: {source}")]
    Execution {
        migration: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Migration {migration} could not be recorded: {source}")]
    Persistence {
        migration: String,
        #[source]
        source: DbError,
    },

    /// The notx script of `migration` is durable but the migration has no
    /// ledger row.
    #[error(
        "Migration {migration} failed after its notx script was applied, manual cleanup may be required: {source}"
    )]
    NoTxResidue {
        migration: String,
        #[source]
        source: Box<DatError>,
    },

    #[error("Stored procedure {file} failed: {source}")]
    Sproc {
        file: String,
        #[source]
        source: ExecutionError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl DatError {
    /// Name of the migration this error belongs to, if any.
    pub fn migration(&self) -> Option<&str> {
        match self {
            DatError::Execution { migration, .. }
            | DatError::Persistence { migration, .. }
            | DatError::NoTxResidue { migration, .. } => Some(migration),
            _ => None,
        }
    }
}

/// Result type alias using DatError.
pub type Result<T> = std::result::Result<T, DatError>;

/// Error reported by the database driver for a single statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The statement ran but the driver signalled that nothing was affected.
    ///
    /// sqlx never raises this for PostgreSQL, so the Postgres adapter does not
    /// produce it. It exists for drivers that report an empty result as an
    /// error, and is exercised through the in-memory test database.
    #[error("no rows affected")]
    NoRowsAffected,

    /// Structured error returned by the server.
    #[error("[{severity}={code}] {message}")]
    Server {
        severity: String,
        code: String,
        message: String,
        /// 1-based character offset into the submitted statement.
        position: Option<usize>,
    },

    /// Connection, protocol or other client-side failure.
    #[error("{0}")]
    Driver(String),
}

impl DbError {
    pub fn server(severity: &str, code: &str, message: impl Into<String>) -> Self {
        DbError::Server {
            severity: severity.to_string(),
            code: code.to_string(),
            message: message.into(),
            position: None,
        }
    }

    /// Attach a statement offset to a server error. Other kinds are returned unchanged.
    pub fn at_position(self, offset: usize) -> Self {
        match self {
            DbError::Server {
                severity,
                code,
                message,
                ..
            } => DbError::Server {
                severity,
                code,
                message,
                position: Some(offset),
            },
            other => other,
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            DbError::Server { position, .. } => *position,
            _ => None,
        }
    }

    pub fn is_no_rows_affected(&self) -> bool {
        matches!(self, DbError::NoRowsAffected)
    }
}

/// A statement of a script failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Text of the failing batch as it was submitted.
    pub statement: String,
    pub error: DbError,
    /// Where in `statement` the server located the error.
    pub location: Option<Location>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.location) {
            (
                DbError::Server {
                    severity,
                    code,
                    message,
                    ..
                },
                Some(location),
            ) => write!(f, "[{}={}] {} at {}", severity, code, message, location),
            (error, _) => write!(f, "{}", error),
        }
    }
}

/// One way the local migration set disagrees with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    /// Applied to the database but absent from the local set.
    MissingLocally { name: String },

    /// Older than the newest applied migration yet never applied.
    Unapplied { name: String, frontier: String },
}

impl Drift {
    pub fn name(&self) -> &str {
        match self {
            Drift::MissingLocally { name } | Drift::Unapplied { name, .. } => name,
        }
    }
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::MissingLocally { name } => write!(
                f,
                "{} was migrated in the database but does not exist locally",
                name
            ),
            Drift::Unapplied { name, frontier } => write!(
                f,
                "{} will not be migrated, it is older than the last applied migration {}",
                name, frontier
            ),
        }
    }
}

/// Local migrations diverge from the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationError {
    pub violations: Vec<Drift>,
}

impl ReconciliationError {
    /// Every offending migration name, in report order.
    pub fn names(&self) -> Vec<&str> {
        self.violations.iter().map(Drift::name).collect()
    }
}

impl fmt::Display for ReconciliationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Local migrations are out of sync with the ledger, rename as needed:"
        )?;
        for drift in &self.violations {
            write!(f, "\n  - {}", drift)?;
        }
        Ok(())
    }
}
