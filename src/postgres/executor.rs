use tokio_postgres::Client;

use super::params::Params;
use super::query::build_result_set;
use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::{ExecOutcome, RowValues};

/// Execute a batch of SQL statements.
///
/// # Errors
///
/// Returns `SqlMapperError::PostgresError` if any statement fails.
pub async fn execute_batch(client: &Client, sql: &str) -> Result<(), SqlMapperError> {
    client.batch_execute(sql).await?;
    Ok(())
}

/// Execute a row-returning query.
///
/// # Errors
///
/// Returns `SqlMapperError::PostgresError` if preparation or execution fails.
pub async fn execute_select(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlMapperError> {
    let stmt = client.prepare(sql).await?;
    let params = Params::convert(params);
    let rows = client.query(&stmt, params.as_refs()).await?;
    build_result_set(&stmt, &rows)
}

/// Execute a DML statement. Postgres reports no insert id; use `RETURNING` instead.
///
/// # Errors
///
/// Returns `SqlMapperError::PostgresError` if preparation or execution fails.
pub async fn execute_dml(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ExecOutcome, SqlMapperError> {
    let stmt = client.prepare(sql).await?;
    let params = Params::convert(params);
    let rows_affected = client.execute(&stmt, params.as_refs()).await?;
    Ok(ExecOutcome {
        rows_affected,
        last_insert_id: None,
    })
}
