use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sql_mapper::PlaceholderStyle;
use sql_mapper::prelude::*;

/// Records every call and answers selects with a fixed result.
#[derive(Clone, Default)]
struct ScriptedSession {
    log: Arc<Mutex<Vec<(String, Vec<RowValues>)>>>,
    rows: Option<(Vec<&'static str>, Vec<Vec<RowValues>>)>,
    delay: Duration,
    fail_on: Option<&'static str>,
    stall_on: Option<&'static str>,
}

impl ScriptedSession {
    fn calls(&self) -> Vec<(String, Vec<RowValues>)> {
        self.log.lock().unwrap().clone()
    }

    fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }

    async fn record(&self, sql: &str, params: &[RowValues]) -> Result<(), SqlMapperError> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_owned(), params.to_vec()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.stall_on.is_some_and(|marker| sql.contains(marker)) {
            std::future::pending::<()>().await;
        }
        match self.fail_on {
            Some(marker) if sql.contains(marker) => {
                Err(SqlMapperError::ExecutionError(format!("scripted failure on {marker}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SqlSession for ScriptedSession {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    async fn select(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlMapperError> {
        self.record(sql, params).await?;
        let mut rs = ResultSet::default();
        if let Some((columns, rows)) = &self.rows {
            rs.set_column_names(Arc::new(columns.iter().map(ToString::to_string).collect()));
            for row in rows {
                rs.add_row_values(row.clone())?;
            }
        }
        Ok(rs)
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, SqlMapperError> {
        self.record(sql, params).await?;
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        self.record(sql, &[]).await
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Product {
    sku: String,
    price: f64,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn named_parameters_reach_the_session_as_positional_values()
-> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        rows: Some((
            vec!["sku", "price"],
            vec![vec![RowValues::Text("A-1".into()), RowValues::Float(9.5)]],
        )),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session.clone()));

    let product: Option<Product> = mapper
        .fetch_one(
            "SELECT sku, price FROM products WHERE price < :max AND sku <> :sku AND price > :max / 10",
            &named_params! { "sku" => "Z-9", "max" => 20.0, "unused" => 1 },
        )
        .await?;
    assert_eq!(
        product,
        Some(Product {
            sku: "A-1".into(),
            price: 9.5
        })
    );

    assert_eq!(
        session.calls(),
        vec![(
            "SELECT sku, price FROM products WHERE price < $1 AND sku <> $2 AND price > $1 / 10"
                .to_string(),
            vec![RowValues::Float(20.0), RowValues::Text("Z-9".into())],
        )]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scope_error_rolls_back_and_is_returned_unchanged()
-> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        fail_on: Some("second"),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session.clone()));

    let err = mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute("UPDATE t SET a = 1 -- first", &named_params!())
                    .await?;
                tx.execute("UPDATE t SET a = 2 -- second", &named_params!())
                    .await?;
                tx.execute("UPDATE t SET a = 3 -- third", &named_params!())
                    .await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SqlMapperError::ExecutionError(ref msg) if msg.contains("second")));
    assert_eq!(
        session.statements(),
        [
            "BEGIN",
            "UPDATE t SET a = 1 -- first",
            "UPDATE t SET a = 2 -- second",
            "ROLLBACK"
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_commit_is_rolled_back() -> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        fail_on: Some("COMMIT"),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session.clone()));

    let err = mapper
        .transaction(|tx| {
            Box::pin(async move {
                tx.execute("UPDATE t SET a = 1", &named_params!()).await?;
                Ok::<_, SqlMapperError>(())
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SqlMapperError::ExecutionError(ref msg) if msg.contains("COMMIT")));
    assert!(!mapper.in_transaction());
    assert_eq!(
        session.statements(),
        ["BEGIN", "UPDATE t SET a = 1", "COMMIT", "ROLLBACK"]
    );

    // the mapper can start over on the same connection
    mapper.begin().await?;
    mapper.rollback().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_commit_failure_keeps_transaction_open() -> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        fail_on: Some("COMMIT"),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session.clone()));

    mapper.begin().await?;
    assert!(mapper.commit().await.is_err());
    assert!(mapper.in_transaction());
    mapper.rollback().await?;
    assert!(!mapper.in_transaction());
    assert_eq!(session.statements(), ["BEGIN", "COMMIT", "ROLLBACK"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scope_cancelled_during_commit_is_recovered() -> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        stall_on: Some("COMMIT"),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session.clone()));

    let timed_out = tokio::time::timeout(
        Duration::from_millis(100),
        mapper.transaction(|tx| {
            Box::pin(async move {
                tx.execute("UPDATE t SET a = 1", &named_params!()).await?;
                Ok::<_, SqlMapperError>(())
            })
        }),
    )
    .await;
    assert!(timed_out.is_err());

    mapper.execute("UPDATE t SET a = 2", &named_params!()).await?;
    assert!(!mapper.in_transaction());
    assert_eq!(
        session.statements(),
        [
            "BEGIN",
            "UPDATE t SET a = 1",
            "COMMIT",
            "ROLLBACK",
            "UPDATE t SET a = 2"
        ]
    );

    mapper.begin().await?;
    assert!(mapper.in_transaction());
    mapper.rollback().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn monitor_counts_slow_and_fast_calls() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let monitor = Arc::new(QueryMonitor::new(Duration::from_millis(50)));
    let slow = ScriptedSession {
        delay: Duration::from_millis(120),
        ..ScriptedSession::default()
    };

    let mut slow_mapper = SqlMapper::new(Box::new(slow)).with_monitor(Arc::clone(&monitor));
    slow_mapper
        .execute("DELETE FROM sessions WHERE expired", &named_params!())
        .await?;
    let snap = monitor.snapshot();
    assert_eq!((snap.total_calls, snap.slow_calls), (1, 1));

    let mut fast_mapper =
        SqlMapper::new(Box::new(ScriptedSession::default())).with_monitor(Arc::clone(&monitor));
    fast_mapper
        .execute("DELETE   FROM sessions\nWHERE expired", &named_params!())
        .await?;
    let snap = monitor.snapshot();
    assert_eq!((snap.total_calls, snap.slow_calls), (2, 1));
    assert!(snap.total_duration >= Duration::from_millis(120));

    let stat = monitor
        .statistic("DELETE FROM sessions WHERE expired")
        .ok_or("statement should be tracked")?;
    assert_eq!((stat.count, stat.slow_count), (2, 1));
    assert!(stat.max_duration >= Duration::from_millis(120));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_val_needs_exactly_one_column() -> Result<(), Box<dyn std::error::Error>> {
    let session = ScriptedSession {
        rows: Some((
            vec!["a", "b"],
            vec![vec![RowValues::Int(1), RowValues::Int(2)]],
        )),
        ..ScriptedSession::default()
    };
    let mut mapper = SqlMapper::new(Box::new(session));
    let err = mapper
        .fetch_val("SELECT a, b FROM t", &named_params!())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::AmbiguousResult(2)));

    let mut empty = SqlMapper::new(Box::new(ScriptedSession::default()));
    let err = empty
        .fetch_val("SELECT a FROM t", &named_params!())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlMapperError::EmptyResult));
    Ok(())
}
