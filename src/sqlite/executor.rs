use rusqlite::params_from_iter;

use super::config::SharedSqliteConnection;
use super::params::Params;
use super::query::build_result_set;
use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::{ExecOutcome, RowValues};

/// Run `func` against the connection on tokio's blocking pool.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlMapperError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlMapperError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlMapperError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Execute a batch of SQL statements.
///
/// # Errors
///
/// Returns `SqlMapperError::SqliteError` if any statement fails.
pub async fn execute_batch(conn: SharedSqliteConnection, sql: &str) -> Result<(), SqlMapperError> {
    let sql = sql.to_owned();
    run_blocking(conn, move |guard| {
        guard
            .execute_batch(&sql)
            .map_err(SqlMapperError::SqliteError)
    })
    .await
}

/// Execute a row-returning query.
///
/// # Errors
///
/// Returns `SqlMapperError::SqliteError` if preparation or execution fails.
pub async fn execute_select(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlMapperError> {
    let sql = sql.to_owned();
    let params = Params::convert(params);
    run_blocking(conn, move |guard| {
        let mut stmt = guard.prepare_cached(&sql)?;
        build_result_set(&mut stmt, params.as_values())
    })
    .await
}

/// Execute a DML statement (INSERT, UPDATE, DELETE).
///
/// `last_insert_id` is filled for `INSERT`/`REPLACE` statements that changed at least one row.
///
/// # Errors
///
/// Returns `SqlMapperError::SqliteError` if execution fails.
pub async fn execute_dml(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<ExecOutcome, SqlMapperError> {
    let sql = sql.to_owned();
    let params = Params::convert(params);
    run_blocking(conn, move |guard| {
        let mut stmt = guard.prepare_cached(&sql)?;
        let changed = stmt.execute(params_from_iter(params.as_values().iter()))?;
        let rows_affected = u64::try_from(changed).map_err(|e| {
            SqlMapperError::ExecutionError(format!("invalid rows affected count: {e}"))
        })?;
        let last_insert_id =
            (rows_affected > 0 && is_insert(&sql)).then(|| guard.last_insert_rowid());
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id,
        })
    })
    .await
}

fn is_insert(sql: &str) -> bool {
    let keyword = leading_keyword(sql);
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

/// First word of `sql` after leading whitespace and comments.
fn leading_keyword(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    let end = sql
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(sql.len());
    &sql[..end]
}
