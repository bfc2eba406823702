use async_trait::async_trait;

use crate::error::SqlMapperError;
use crate::placeholders::PlaceholderStyle;
use crate::results::ResultSet;
use crate::types::{ExecOutcome, RowValues};

/// A single database connection as seen by [`SqlMapper`](crate::SqlMapper).
///
/// Statements arrive already rewritten to [`placeholder_style`](SqlSession::placeholder_style)
/// with their values in marker order. Pooled connections implement this trait; tests can inject
/// their own implementation.
#[async_trait]
pub trait SqlSession: Send {
    /// Positional marker syntax the driver understands.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Run a row-returning statement.
    ///
    /// # Errors
    /// Returns the driver error unchanged.
    async fn select(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlMapperError>;

    /// Run a mutating statement.
    ///
    /// # Errors
    /// Returns the driver error unchanged.
    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, SqlMapperError>;

    /// Run one or more `;`-separated statements without parameters.
    ///
    /// # Errors
    /// Returns the driver error unchanged.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMapperError>;

    async fn begin(&mut self) -> Result<(), SqlMapperError> {
        self.execute_batch("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), SqlMapperError> {
        self.execute_batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlMapperError> {
        self.execute_batch("ROLLBACK").await
    }
}
