#[cfg(feature = "sqlite")]
use std::sync::Arc;

use async_trait::async_trait;

#[cfg(feature = "postgres")]
use crate::postgres::{self, PgPooledConnection};
#[cfg(feature = "sqlite")]
use crate::sqlite::{self, SqlitePooledConnection};

use crate::error::SqlMapperError;
use crate::placeholders::PlaceholderStyle;
use crate::results::ResultSet;
use crate::session::SqlSession;
use crate::types::{ExecOutcome, RowValues};

/// A connection checked out of a [`DbPool`](super::DbPool); returned to the pool on drop.
pub enum MapperConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(SqlitePooledConnection),
    #[cfg(feature = "postgres")]
    Postgres(PgPooledConnection),
}

// tokio_postgres::Client has no useful Debug output
impl std::fmt::Debug for MapperConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<rusqlite::Connection>").finish(),
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").field(&"<Client>").finish(),
        }
    }
}

#[async_trait]
impl SqlSession for MapperConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => PlaceholderStyle::Sqlite,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => PlaceholderStyle::Postgres,
        }
    }

    async fn select(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlMapperError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => sqlite::execute_select(Arc::clone(&**conn), sql, params).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_select(client, sql, params).await,
        }
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, SqlMapperError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => sqlite::execute_dml(Arc::clone(&**conn), sql, params).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_dml(client, sql, params).await,
        }
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => sqlite::execute_batch(Arc::clone(&**conn), sql).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_batch(client, sql).await,
        }
    }
}
