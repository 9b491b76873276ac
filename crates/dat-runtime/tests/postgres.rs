//! Runs against a real PostgreSQL server.
//!
//! Set `TEST_DATABASE_URL` to enable. Each test works in its own schema and
//! drops it afterwards.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sqlx::{Connection, PgConnection};
use tempfile::TempDir;

use dat_core::{DatError, LedgerTable};
use dat_runtime::{
    MigrationConnection, MigrationRunner, MigrationSource, PgMigrationConnection, ScriptExecutor,
    StatementExecutor, TracingReporter,
};

async fn connect() -> Option<PgMigrationConnection> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let conn = PgConnection::connect(&url).await.unwrap();
    Some(PgMigrationConnection::new(conn))
}

fn unique_schema(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}_{}_{}", prefix, std::process::id(), nanos)
}

fn write_migration(dir: &Path, name: &str, files: &[(&str, String)]) {
    let path = dir.join(name);
    fs::create_dir_all(&path).unwrap();
    for (file, body) in files {
        fs::write(path.join(file), body).unwrap();
    }
}

fn runner(dir: &Path, schema: &str) -> MigrationRunner {
    MigrationRunner::new(
        MigrationSource::new(dir),
        ScriptExecutor::default(),
        LedgerTable::parse(&format!("{}.migrations_ledger", schema)).unwrap(),
        Arc::new(TracingReporter),
    )
}

async fn table_exists(conn: &mut PgMigrationConnection, schema: &str, table: &str) -> bool {
    let statement = format!(
        "DO $$ BEGIN IF to_regclass('{}.{}') IS NULL THEN RAISE EXCEPTION 'missing'; END IF; END $$",
        schema, table
    );
    conn.execute(&statement).await.is_ok()
}

#[tokio::test]
async fn test_migrations_apply_and_roll_back() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let schema = unique_schema("dat_apply");
    conn.execute(&format!("CREATE SCHEMA {}", schema)).await.unwrap();

    let dir = TempDir::new().unwrap();
    write_migration(
        dir.path(),
        "202001010000-init",
        &[(
            "up.sql",
            format!("create table {}.users (id int);\nGO\ninsert into {}.users values (1);\n", schema, schema),
        )],
    );
    write_migration(
        dir.path(),
        "202002010000-broken",
        &[(
            "up.sql",
            format!("create table {}.posts (id int);\nGO\nselec 1;\n", schema),
        )],
    );

    let runner = runner(dir.path(), &schema);
    let result = runner.run(&mut conn).await;

    match &result {
        Err(DatError::Execution { migration, source }) => {
            assert_eq!(migration, "202002010000-broken");
            assert_eq!(source.statement, "selec 1;\n");
            let location = source.location.expect("server reports a position");
            assert_eq!(location.line, 1);
        }
        other => panic!("expected Execution error, got {:?}", other),
    }

    assert!(table_exists(&mut conn, &schema, "users").await);
    assert!(!table_exists(&mut conn, &schema, "posts").await);

    let ledger = LedgerTable::parse(&format!("{}.migrations_ledger", schema)).unwrap();
    let applied = conn.applied(&ledger).await.unwrap();
    let names: Vec<&str> = applied.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["202001010000-init"]);
    assert!(applied[0].applied_at.is_some());

    conn.execute(&format!("DROP SCHEMA {} CASCADE", schema)).await.unwrap();
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_notx_runs_outside_transaction() {
    let Some(mut conn) = connect().await else {
        return;
    };
    let schema = unique_schema("dat_notx");
    conn.execute(&format!("CREATE SCHEMA {}", schema)).await.unwrap();
    conn.execute(&format!("create table {}.items (id int)", schema))
        .await
        .unwrap();

    let dir = TempDir::new().unwrap();
    write_migration(
        dir.path(),
        "202001010000-index",
        &[
            (
                "notx.sql",
                format!("create index concurrently items_id on {}.items (id);", schema),
            ),
            ("up.sql", format!("comment on table {}.items is 'indexed';", schema)),
        ],
    );

    let summary = runner(dir.path(), &schema).run(&mut conn).await.unwrap();
    assert_eq!(summary.applied, vec!["202001010000-index"]);

    let summary = runner(dir.path(), &schema).run(&mut conn).await.unwrap();
    assert!(summary.applied.is_empty());

    conn.execute(&format!("DROP SCHEMA {} CASCADE", schema)).await.unwrap();
    conn.close().await.unwrap();
}
