pub mod connection;

pub use connection::MapperConnection;

#[cfg(feature = "postgres")]
use crate::postgres::PgManager;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteManager;

use crate::dsn::Dsn;
use crate::error::SqlMapperError;
use crate::types::DatabaseType;

/// A bb8 pool for one of the supported backends.
#[derive(Clone)]
pub enum DbPool {
    #[cfg(feature = "sqlite")]
    Sqlite(bb8::Pool<SqliteManager>),
    #[cfg(feature = "postgres")]
    Postgres(bb8::Pool<PgManager>),
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => pool.state(),
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => pool.state(),
        };
        f.debug_struct("DbPool")
            .field("database_type", &self.database_type())
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl DbPool {
    /// Open a pool for `dsn` holding at most `max_size` connections.
    ///
    /// In-memory `SQLite` is capped at one connection.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the backend is not compiled in or the first
    /// connection cannot be established.
    pub async fn connect(dsn: &Dsn, max_size: u32) -> Result<Self, SqlMapperError> {
        match dsn {
            #[cfg(feature = "sqlite")]
            Dsn::Sqlite(target) => {
                let pool = SqliteManager::new(target.clone())
                    .build_pool(max_size)
                    .await?;
                Ok(DbPool::Sqlite(pool))
            }
            #[cfg(feature = "postgres")]
            Dsn::Postgres(pg) => {
                let pool = PgManager::from_dsn(pg).build_pool(max_size).await?;
                Ok(DbPool::Postgres(pool))
            }
            #[allow(unreachable_patterns)]
            other => Err(SqlMapperError::ConnectionError(format!(
                "{other}: backend support not enabled in this build"
            ))),
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseType::Postgres,
        }
    }

    /// Check out a connection that stays with the caller until dropped.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if no connection becomes available.
    pub async fn get_connection(&self) -> Result<MapperConnection, SqlMapperError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => {
                let conn = pool.get_owned().await.map_err(|e| {
                    SqlMapperError::ConnectionError(format!("sqlite checkout error: {e}"))
                })?;
                Ok(MapperConnection::Sqlite(conn))
            }
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => {
                let conn = pool.get_owned().await.map_err(|e| {
                    SqlMapperError::ConnectionError(format!("postgres checkout error: {e}"))
                })?;
                Ok(MapperConnection::Postgres(conn))
            }
        }
    }
}
