use std::future::Future;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio_postgres::{Client, NoTls};

use crate::dsn::PostgresDsn;
use crate::error::SqlMapperError;

/// A pooled Postgres client checked out for the life of one facade.
pub type PgPooledConnection = PooledConnection<'static, PgManager>;

/// bb8 manager for Postgres clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Manager for a parsed DSN. `application_name` and `connect_timeout` (seconds) are taken
    /// from the query string; other options are ignored.
    #[must_use]
    pub fn from_dsn(dsn: &PostgresDsn) -> Self {
        let mut cfg = tokio_postgres::Config::new();
        cfg.host(dsn.host.as_str())
            .port(dsn.port)
            .dbname(dsn.database.as_str());
        if let Some(user) = &dsn.user {
            cfg.user(user.as_str());
        }
        if let Some(password) = &dsn.password {
            cfg.password(password.as_str());
        }
        for (key, value) in &dsn.options {
            match key.as_str() {
                "application_name" => {
                    cfg.application_name(value.as_str());
                }
                "connect_timeout" => match value.parse::<u64>() {
                    Ok(secs) => {
                        cfg.connect_timeout(Duration::from_secs(secs));
                    }
                    Err(_) => tracing::warn!(value = %value, "ignoring invalid connect_timeout"),
                },
                other => tracing::debug!(option = other, "ignoring unsupported postgres DSN option"),
            }
        }
        Self::new(cfg)
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if pool creation fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<PgManager>, SqlMapperError> {
        Pool::builder()
            .max_size(max_size.max(1))
            .build(self)
            .await
            .map_err(|e| SqlMapperError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            tracing::debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection closed with error");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
