//! Migration model and ledger reconciliation.

mod name;
mod reconcile;

pub use name::{slugify, timestamped_name, MigrationName, NameError, TIMESTAMP_FORMAT};
pub use reconcile::{pending, verify, Named};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Script file names inside a migration directory.
pub const UP_SCRIPT: &str = "up.sql";
pub const DOWN_SCRIPT: &str = "down.sql";
pub const NO_TX_SCRIPT: &str = "notx.sql";

/// One versioned change set.
///
/// Discovery creates it with only a name. Script bodies are filled in when
/// the migration is about to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: MigrationName,
    pub up_script: Option<String>,
    pub down_script: Option<String>,
    pub no_tx_script: Option<String>,
}

impl Migration {
    /// A migration known only by name.
    pub fn partial(name: MigrationName) -> Self {
        Self {
            name,
            up_script: None,
            down_script: None,
            no_tx_script: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn is_partial(&self) -> bool {
        self.up_script.is_none() && self.down_script.is_none() && self.no_tx_script.is_none()
    }

    /// The ledger row for this migration, once its up script is known.
    pub fn to_entry(&self) -> Option<LedgerEntry> {
        Some(LedgerEntry {
            name: self.name.to_string(),
            up_script: self.up_script.clone()?,
            down_script: self.down_script.clone(),
            no_tx_script: self.no_tx_script.clone(),
        })
    }
}

/// A row written to the ledger when a migration is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub name: String,
    pub up_script: String,
    pub down_script: Option<String>,
    pub no_tx_script: Option<String>,
}

/// A migration read back from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub has_down: bool,
}

impl AppliedMigration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            applied_at: None,
            has_down: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> MigrationName {
        MigrationName::parse(raw).unwrap()
    }

    #[test]
    fn test_partial_migration() {
        let migration = Migration::partial(name("202001010000-init"));
        assert!(migration.is_partial());
        assert_eq!(migration.name(), "202001010000-init");
        assert!(migration.to_entry().is_none());
    }

    #[test]
    fn test_to_entry_carries_scripts() {
        let migration = Migration {
            up_script: Some("create table t ();".into()),
            down_script: Some("drop table t;".into()),
            ..Migration::partial(name("202001010000-init"))
        };
        let entry = migration.to_entry().unwrap();
        assert_eq!(entry.name, "202001010000-init");
        assert_eq!(entry.up_script, "create table t ();");
        assert_eq!(entry.down_script.as_deref(), Some("drop table t;"));
        assert_eq!(entry.no_tx_script, None);
    }
}
