//! SQL text helpers for the few statements dat builds itself.

use crate::error::{DatError, Result};

/// Quote a single identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of the ledger table, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTable {
    schema: Option<String>,
    table: String,
}

impl LedgerTable {
    /// Parse `table` or `schema.table`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || DatError::Config(format!("Invalid ledger table name: {:?}", raw));

        let (schema, table) = match raw.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, raw),
        };
        if table.is_empty() || table.contains('.') || schema.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    /// The quoted, possibly qualified, name for use in statements.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    pub fn create_statement(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                up_script TEXT NOT NULL,
                down_script TEXT,
                no_tx_script TEXT,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.quoted()
        )
    }

    pub fn insert_statement(&self) -> String {
        format!(
            "INSERT INTO {} (name, up_script, down_script, no_tx_script) VALUES ($1, $2, $3, $4)",
            self.quoted()
        )
    }

    pub fn select_statement(&self) -> String {
        format!(
            "SELECT name, applied_at, down_script IS NOT NULL AS has_down FROM {} ORDER BY name ASC",
            self.quoted()
        )
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self {
            schema: None,
            table: crate::config::DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

/// Statements that drop `database` and its owner `user`, terminating other
/// sessions first.
pub fn drop_statements(database: &str, user: &str) -> Vec<String> {
    vec![
        format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = {} AND pid <> pg_backend_pid()",
            quote_literal(database)
        ),
        format!("DROP DATABASE IF EXISTS {}", quote_ident(database)),
        format!("DROP USER IF EXISTS {}", quote_ident(user)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_ledger_table_parse() {
        assert_eq!(
            LedgerTable::parse("migrations_ledger").unwrap().quoted(),
            "\"migrations_ledger\""
        );
        assert_eq!(
            LedgerTable::parse("ops.ledger").unwrap().quoted(),
            "\"ops\".\"ledger\""
        );
        assert!(LedgerTable::parse("").is_err());
        assert!(LedgerTable::parse(".ledger").is_err());
        assert!(LedgerTable::parse("a.b.c").is_err());
    }

    #[test]
    fn test_insert_statement_columns() {
        let sql = LedgerTable::default().insert_statement();
        assert!(sql.contains("\"migrations_ledger\""));
        assert!(sql.contains("(name, up_script, down_script, no_tx_script)"));
    }

    #[test]
    fn test_drop_statements_quote_names() {
        let statements = drop_statements("app's db", "app");
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("'app''s db'"));
        assert_eq!(statements[1], "DROP DATABASE IF EXISTS \"app's db\"");
        assert_eq!(statements[2], "DROP USER IF EXISTS \"app\"");
    }
}
