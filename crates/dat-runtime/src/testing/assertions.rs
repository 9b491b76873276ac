//! Assertion macros and helpers for migration tests.

use super::MemoryDatabase;

/// Names of the committed ledger rows, in insertion order.
pub fn ledger_names(db: &MemoryDatabase) -> Vec<&str> {
    db.ledger().iter().map(|entry| entry.name.as_str()).collect()
}

/// Assert the ledger of a [`MemoryDatabase`] holds exactly `names`, in order.
#[macro_export]
macro_rules! assert_ledger {
    ($db:expr, [$($name:expr),* $(,)?]) => {{
        let expected: Vec<&str> = vec![$($name),*];
        let actual = $crate::testing::ledger_names(&$db);
        assert_eq!(
            actual, expected,
            "assertion failed: ledger holds {:?}, expected {:?}",
            actual, expected
        );
    }};
}

/// Assert a result is a specific `DatError` variant.
#[macro_export]
macro_rules! assert_dat_err {
    ($expr:expr, $pattern:pat) => {
        match &$expr {
            Err($pattern) => (),
            Err(e) => panic!(
                "assertion failed: expected {}, got Err({:?})",
                stringify!($pattern),
                e
            ),
            Ok(v) => panic!(
                "assertion failed: expected {}, got Ok({:?})",
                stringify!($pattern),
                v
            ),
        }
    };
}
