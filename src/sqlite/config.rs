use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use super::executor::run_blocking;
use crate::dsn::SqliteTarget;
use crate::error::SqlMapperError;

/// A `rusqlite` connection shared between the pool and blocking tasks.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;
/// A pooled `SQLite` connection checked out for the life of one facade.
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// bb8 manager for `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    target: SqliteTarget,
}

impl SqliteManager {
    #[must_use]
    pub fn new(target: SqliteTarget) -> Self {
        Self { target }
    }

    /// Build a pool from this manager.
    ///
    /// An in-memory database lives inside a single connection, so its pool holds exactly one
    /// connection that is never retired.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the first connection cannot be opened.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, SqlMapperError> {
        let builder = if self.target == SqliteTarget::Memory {
            Pool::builder()
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder().max_size(max_size.max(1))
        };
        builder
            .build(self)
            .await
            .map_err(|e| SqlMapperError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

fn open(target: &SqliteTarget) -> Result<rusqlite::Connection, SqlMapperError> {
    let conn = match target {
        SqliteTarget::Memory => rusqlite::Connection::open_in_memory()?,
        SqliteTarget::File(path) => {
            let conn = rusqlite::Connection::open(path)?;
            // journal_mode answers with the resulting mode as a row
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn
        }
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlMapperError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let target = self.target.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || open(&target))
                .await
                .map_err(|e| {
                    SqlMapperError::ConnectionError(format!("sqlite open join error: {e}"))
                })??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlMapperError::SqliteError)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
