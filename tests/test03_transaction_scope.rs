#![cfg(feature = "sqlite")]

use std::time::Duration;

use sql_mapper::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

async fn ledger(prefix: &str) -> Result<SqlMapper, SqlMapperError> {
    let mut mapper = SqlMapper::from_dsn(&format!("sqlite:///{}", unique_db_path(prefix)))?;
    mapper.connect().await?;
    mapper
        .execute_batch(
            "CREATE TABLE entries (id INTEGER PRIMARY KEY, amount INTEGER NOT NULL);
             INSERT INTO entries (id, amount) VALUES (1, 100);",
        )
        .await?;
    Ok(mapper)
}

async fn entry_count(mapper: &mut SqlMapper) -> Result<i64, SqlMapperError> {
    mapper
        .fetch_val_as("SELECT COUNT(*) FROM entries", &named_params!())
        .await
}

const INSERT: &str = "INSERT INTO entries (id, amount) VALUES (:id, :amount)";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_second_statement_rolls_back_all_three() -> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = ledger("rollback").await?;

    let result = mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(INSERT, &named_params! { "id" => 2, "amount" => 10 })
                    .await?;
                // id 1 already exists
                tx.execute(INSERT, &named_params! { "id" => 1, "amount" => 20 })
                    .await?;
                tx.execute(INSERT, &named_params! { "id" => 3, "amount" => 30 })
                    .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await;

    assert!(matches!(result, Err(SqlMapperError::SqliteError(_))));
    assert!(!mapper.in_transaction());
    assert_eq!(entry_count(&mut mapper).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn successful_scope_commits_and_returns_value() -> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = ledger("commit").await?;

    let total = mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(INSERT, &named_params! { "id" => 2, "amount" => 5 })
                    .await?;
                tx.fetch_val_as::<i64>("SELECT SUM(amount) FROM entries", &named_params!())
                    .await
            })
        })
        .await?;

    assert_eq!(total, 105);
    assert_eq!(entry_count(&mut mapper).await?, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_scope_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = ledger("nested").await?;

    let result = mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(INSERT, &named_params! { "id" => 2, "amount" => 1 })
                    .await?;
                tx.transaction(|_inner| Box::pin(async move { Ok::<_, SqlMapperError>(()) }))
                    .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await;

    assert!(matches!(result, Err(SqlMapperError::ExecutionError(_))));
    assert_eq!(entry_count(&mut mapper).await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_scope_is_rolled_back_before_next_statement()
-> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = ledger("abandoned").await?;

    let timed_out = tokio::time::timeout(
        Duration::from_millis(200),
        mapper.transaction(|tx| {
            Box::pin(async move {
                tx.execute(INSERT, &named_params! { "id" => 2, "amount" => 1 })
                    .await?;
                std::future::pending::<()>().await;
                Ok::<_, SqlMapperError>(())
            })
        }),
    )
    .await;
    assert!(timed_out.is_err());

    // the open transaction is rolled back before this query runs
    assert_eq!(entry_count(&mut mapper).await?, 1);
    assert!(!mapper.in_transaction());

    // and the connection accepts a fresh transaction afterwards
    mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute(INSERT, &named_params! { "id" => 3, "amount" => 1 })
                    .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await?;
    assert_eq!(entry_count(&mut mapper).await?, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_begin_commit_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = ledger("manual").await?;

    mapper.begin().await?;
    assert!(matches!(
        mapper.begin().await,
        Err(SqlMapperError::ExecutionError(_))
    ));
    mapper
        .execute(INSERT, &named_params! { "id" => 2, "amount" => 1 })
        .await?;
    mapper.rollback().await?;
    assert_eq!(entry_count(&mut mapper).await?, 1);

    mapper.begin().await?;
    mapper
        .execute(INSERT, &named_params! { "id" => 2, "amount" => 1 })
        .await?;
    mapper.commit().await?;
    assert_eq!(entry_count(&mut mapper).await?, 2);

    assert!(matches!(
        mapper.commit().await,
        Err(SqlMapperError::ExecutionError(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn commit_rejected_by_deferred_foreign_key_is_rolled_back()
-> Result<(), Box<dyn std::error::Error>> {
    let mut mapper = SqlMapper::from_dsn(&format!("sqlite:///{}", unique_db_path("deferred")))?;
    mapper.connect().await?;
    mapper
        .execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parents (id INTEGER PRIMARY KEY);
             CREATE TABLE children (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER NOT NULL
                     REFERENCES parents(id) DEFERRABLE INITIALLY DEFERRED
             );",
        )
        .await?;

    let result = mapper
        .transaction(|tx| {
            Box::pin(async move {
                // accepted now, checked only at COMMIT
                tx.execute(
                    "INSERT INTO children (id, parent_id) VALUES (:id, :parent)",
                    &named_params! { "id" => 1, "parent" => 99 },
                )
                .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await;

    assert!(matches!(result, Err(SqlMapperError::SqliteError(_))));
    assert!(!mapper.in_transaction());
    let orphans: i64 = mapper
        .fetch_val_as("SELECT COUNT(*) FROM children", &named_params!())
        .await?;
    assert_eq!(orphans, 0);

    // the connection is out of the failed transaction and accepts a new one
    mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute("INSERT INTO parents (id) VALUES (:id)", &named_params! { "id" => 99 })
                    .await?;
                tx.execute(
                    "INSERT INTO children (id, parent_id) VALUES (:id, :parent)",
                    &named_params! { "id" => 1, "parent" => 99 },
                )
                .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await?;
    let children: i64 = mapper
        .fetch_val_as("SELECT COUNT(*) FROM children", &named_params!())
        .await?;
    assert_eq!(children, 1);
    Ok(())
}
