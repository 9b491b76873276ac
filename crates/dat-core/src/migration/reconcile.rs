//! Pre-flight comparison of local migrations against the ledger.
//!
//! Both inputs must already be sorted ascending by name. Nothing here
//! re-sorts or touches the database.

use std::collections::HashSet;

use super::{AppliedMigration, LedgerEntry, Migration, MigrationName};
use crate::error::{Drift, ReconciliationError};

/// Anything identified by a migration name.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Migration {
    fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl Named for MigrationName {
    fn name(&self) -> &str {
        self.as_str()
    }
}

impl Named for AppliedMigration {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for LedgerEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for String {
    fn name(&self) -> &str {
        self
    }
}

impl Named for &str {
    fn name(&self) -> &str {
        self
    }
}

/// Verify the local migrations are in sync with the ledger.
///
/// Fails when the ledger holds a migration that does not exist locally, or
/// when a local migration older than the newest applied one was never
/// applied. Every violation is reported, not just the first.
pub fn verify<L: Named, D: Named>(local: &[L], ledger: &[D]) -> Result<(), ReconciliationError> {
    let Some(last) = ledger.last() else {
        return Ok(());
    };

    let local_names: HashSet<&str> = local.iter().map(Named::name).collect();
    let ledger_names: HashSet<&str> = ledger.iter().map(Named::name).collect();

    let mut violations: Vec<Drift> = ledger
        .iter()
        .filter(|applied| !local_names.contains(applied.name()))
        .map(|applied| Drift::MissingLocally {
            name: applied.name().to_string(),
        })
        .collect();

    let frontier = last.name();
    violations.extend(
        local
            .iter()
            .filter(|m| m.name() < frontier && !ledger_names.contains(m.name()))
            .map(|m| Drift::Unapplied {
                name: m.name().to_string(),
                frontier: frontier.to_string(),
            }),
    );

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ReconciliationError { violations })
    }
}

/// Local migrations that still have to run: those past the ledger frontier.
pub fn pending<'a, L: Named, D: Named>(local: &'a [L], ledger: &[D]) -> Vec<&'a L> {
    let applied: HashSet<&str> = ledger.iter().map(Named::name).collect();
    let frontier = ledger.last().map(Named::name);

    local
        .iter()
        .filter(|m| !applied.contains(m.name()))
        .filter(|m| frontier.map_or(true, |frontier| m.name() > frontier))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_always_succeeds() {
        let local = ["202001010000-init", "202002010000-add-col"];
        let ledger: [&str; 0] = [];
        assert!(verify(&local, &ledger).is_ok());

        let nothing: [&str; 0] = [];
        assert!(verify(&nothing, &ledger).is_ok());
    }

    #[test]
    fn test_in_sync() {
        let local = ["202001010000-init", "202002010000-add-col", "202003010000-next"];
        let ledger = ["202001010000-init", "202002010000-add-col"];
        assert!(verify(&local, &ledger).is_ok());
    }

    #[test]
    fn test_ledger_entry_missing_locally() {
        let local = ["202002010000-add-col"];
        let ledger = ["202001010000-init", "202002010000-add-col"];
        let err = verify(&local, &ledger).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Drift::MissingLocally {
                name: "202001010000-init".into()
            }]
        );
    }

    #[test]
    fn test_older_local_migration_never_applied() {
        let local = [
            "202001010000-init",
            "202001150000-branch-work",
            "202002010000-add-col",
        ];
        let ledger = ["202001010000-init", "202002010000-add-col"];
        let err = verify(&local, &ledger).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Drift::Unapplied {
                name: "202001150000-branch-work".into(),
                frontier: "202002010000-add-col".into(),
            }]
        );
    }

    #[test]
    fn test_reports_every_violation() {
        let local = ["202001150000-renamed", "202002010000-add-col"];
        let ledger = ["202001010000-init", "202002010000-add-col"];
        let err = verify(&local, &ledger).unwrap_err();
        assert_eq!(err.names(), vec!["202001010000-init", "202001150000-renamed"]);
    }

    #[test]
    fn test_newer_local_migration_is_not_drift() {
        let local = ["202001010000-init", "202005010000-newer"];
        let ledger = ["202001010000-init"];
        assert!(verify(&local, &ledger).is_ok());
    }

    #[test]
    fn test_verify_is_repeatable() {
        let local = ["202002010000-add-col"];
        let ledger = ["202001010000-init"];
        let first = verify(&local, &ledger);
        let second = verify(&local, &ledger);
        assert_eq!(first, second);
    }

    #[test]
    fn test_pending_after_frontier() {
        let local = ["202001010000-init", "202002010000-add-col", "202003010000-next"];
        let ledger = ["202001010000-init"];
        let pending = pending(&local, &ledger);
        assert_eq!(pending, vec![&"202002010000-add-col", &"202003010000-next"]);
    }

    #[test]
    fn test_pending_with_empty_ledger() {
        let local = ["202001010000-init", "202002010000-add-col"];
        let ledger: [&str; 0] = [];
        assert_eq!(pending(&local, &ledger).len(), 2);
    }

    #[test]
    fn test_works_with_domain_types() {
        let local = vec![Migration::partial(
            MigrationName::parse("202001010000-init").unwrap(),
        )];
        let ledger = vec![AppliedMigration::new("202001010000-init")];
        assert!(verify(&local, &ledger).is_ok());
        assert!(pending(&local, &ledger).is_empty());
    }
}
