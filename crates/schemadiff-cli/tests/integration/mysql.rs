//! MySQL introspection tests.

use schemadiff_cli::introspect::read_database_schema;
use schemadiff_cli::{execute, Command, ConnectionTarget, ExecError, ExecOptions};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::Executor;
use std::fs;
use tempfile::tempdir;

/// Connection string of the test database, from `TEST_MYSQL_DSN`.
fn mysql_dsn() -> String {
    std::env::var("TEST_MYSQL_DSN")
        .unwrap_or_else(|_| "root:root@tcp(127.0.0.1:3306)/schemadiff_test".to_string())
}

fn target() -> ConnectionTarget {
    ConnectionTarget::parse(&mysql_dsn()).expect("TEST_MYSQL_DSN is a connection string")
}

/// Recreate the test database with the given statements.
async fn seed(statements: &[&str]) {
    let target = target();
    let database = schemadiff_engine::quote_identifier(&target.database);
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect_with(target.connect_options())
        .await
        .expect("connect to test server");

    pool.execute(format!("DROP DATABASE IF EXISTS {database}").as_str())
        .await
        .expect("drop test database");
    pool.execute(format!("CREATE DATABASE {database}").as_str())
        .await
        .expect("create test database");
    pool.execute(format!("USE {database}").as_str())
        .await
        .expect("use test database");
    for statement in statements {
        pool.execute(*statement).await.expect("seed statement");
    }
    pool.close().await;
}

// The tests share one database, so they run as a single sequence.
#[tokio::test]
async fn test_mysql_introspection() {
    seed(&[
        "create table parent (id int primary key) auto_increment=7",
        "create table child (id int primary key, parent_id int, constraint fk_parent foreign key (parent_id) references parent (id))",
        "create table `we``ird` (id int)",
        "create view v_child as select id from child",
    ])
    .await;

    let mut statements = read_database_schema(&target()).await.expect("introspect");
    statements.sort();
    assert_eq!(statements.len(), 4, "{statements:#?}");
    assert!(statements.iter().any(|s| s.contains("CREATE TABLE `we``ird`")));

    // A fragment narrows introspection to one entity.
    let single = ConnectionTarget {
        entity: Some("v_child".to_string()),
        ..target()
    };
    let statements = read_database_schema(&single).await.expect("introspect view");
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("VIEW `v_child`"));

    // The live schema loads and orders like any other source.
    let loaded = execute(Command::Load, &mysql_dsn(), "", &ExecOptions::default())
        .await
        .expect("load live schema");
    assert!(loaded.contains("CREATE TABLE `child`"), "{loaded}");

    let dir = tempdir().expect("temp dir");
    let empty = dir.path().join("empty.sql");
    fs::write(&empty, "").expect("write sql");
    let ordered = execute(
        Command::OrderedDiff,
        empty.to_str().expect("sql path"),
        &mysql_dsn(),
        &ExecOptions::default(),
    )
    .await
    .expect("ordered diff");
    let parent = ordered.find("CREATE TABLE `parent`").expect("parent created");
    let child = ordered.find("CREATE TABLE `child`").expect("child created");
    let view = ordered.find("CREATE VIEW `v_child`").expect("view created");
    assert!(parent < child && child < view, "{ordered}");

    // Identical live and file schemas differ only in AUTO_INCREMENT, which is ignored.
    let file = dir.path().join("live.sql");
    fs::write(&file, &loaded).expect("write sql");
    let diff = execute(
        Command::Diff,
        file.to_str().expect("sql path"),
        &mysql_dsn(),
        &ExecOptions::default(),
    )
    .await
    .expect("diff live against dump");
    assert_eq!(diff, "");

    let missing = ConnectionTarget {
        entity: Some("no_such_table".to_string()),
        ..target()
    };
    assert!(read_database_schema(&missing).await.expect("empty result").is_empty());
}

#[tokio::test]
async fn test_mysql_unreachable_server() {
    let target = ConnectionTarget::parse("root:wrong@tcp(127.0.0.1:1)/nothing").expect("dsn");
    let err = read_database_schema(&target).await.unwrap_err();
    assert!(matches!(err, ExecError::Database { .. }), "got {err:?}");
}
