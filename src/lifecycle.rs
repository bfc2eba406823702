//! Process-lifetime pool ownership and per-request facades.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::BoxFuture;

use crate::config::MapperConfig;
use crate::dsn::Dsn;
use crate::error::SqlMapperError;
use crate::mapper::SqlMapper;
use crate::monitor::{MonitorSnapshot, QueryMonitor};
use crate::pool::DbPool;
use crate::registry::StatementRegistry;
use crate::types::DatabaseType;

/// Owns the connection pool between `connect` and `close` and hands out one [`SqlMapper`] per
/// request.
///
/// Every mapper shares the manager's statement registry and query monitor.
#[derive(Debug)]
pub struct MapperManager {
    config: MapperConfig,
    dsn: Dsn,
    database_type: DatabaseType,
    pool: RwLock<Option<DbPool>>,
    registry: Arc<StatementRegistry>,
    monitor: Option<Arc<QueryMonitor>>,
}

impl MapperManager {
    /// Validate the configuration and load the SQL directory. No connection is opened yet.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for an invalid pool size or slow-query threshold,
    /// `SqlMapperError::ConnectionError` for an invalid DSN or a backend this build lacks, or the
    /// registry's load errors for `sql_dir`.
    pub fn new(config: MapperConfig) -> Result<Self, SqlMapperError> {
        config.validate()?;
        let dsn = Dsn::parse(&config.dsn)?;
        let database_type = dsn.database_type()?;

        let registry = match &config.sql_dir {
            Some(dir) => {
                let mut registry = StatementRegistry::with_root(dir)
                    .with_collision_policy(config.collision_policy);
                let count = registry.load_dir()?;
                tracing::debug!(dir = %dir.display(), count, "loaded SQL directory");
                registry
            }
            None => StatementRegistry::new().with_collision_policy(config.collision_policy),
        };

        let monitor = config
            .slow_query_threshold()?
            .map(|threshold| Arc::new(QueryMonitor::new(threshold)));

        Ok(Self {
            config,
            dsn,
            database_type,
            pool: RwLock::new(None),
            registry: Arc::new(registry),
            monitor,
        })
    }

    /// Manager configured from `DATABASE_URL` and the `SQL_MAPPER_*` variables.
    ///
    /// # Errors
    /// See [`MapperConfig::from_env`] and [`MapperManager::new`].
    pub fn from_env() -> Result<Self, SqlMapperError> {
        Self::new(MapperConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Backend selected by the DSN.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<StatementRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn monitor(&self) -> Option<&Arc<QueryMonitor>> {
        self.monitor.as_ref()
    }

    /// Aggregate statistics, or `None` when monitoring is off.
    #[must_use]
    pub fn monitor_snapshot(&self) -> Option<MonitorSnapshot> {
        self.monitor.as_ref().map(|m| m.snapshot())
    }

    /// Open the pool. Calling it again while connected does nothing.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the pool cannot be built.
    pub async fn connect(&self) -> Result<(), SqlMapperError> {
        if self.is_connected() {
            return Ok(());
        }
        let pool = DbPool::connect(&self.dsn, self.config.pool_size).await?;
        let mut slot = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            tracing::info!(
                dsn = %self.dsn,
                database_type = ?self.database_type,
                pool_size = self.config.pool_size,
                "connection pool opened"
            );
            *slot = Some(pool);
        }
        Ok(())
    }

    /// Drop the pool. Connections still held by mappers close when those mappers are dropped.
    #[allow(clippy::unused_async)]
    pub async fn close(&self) {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if pool.is_some() {
            tracing::info!(dsn = %self.dsn, "connection pool closed");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// A new facade holding one pooled connection until it is dropped.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the manager is not connected or no connection
    /// becomes available.
    pub async fn mapper(&self) -> Result<SqlMapper, SqlMapperError> {
        let pool = self
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                SqlMapperError::ConnectionError(
                    "mapper manager is not connected; call connect() first".into(),
                )
            })?;
        let conn = pool.get_connection().await?;
        let mut mapper = SqlMapper::new(Box::new(conn)).with_registry(Arc::clone(&self.registry));
        if let Some(monitor) = &self.monitor {
            mapper = mapper.with_monitor(Arc::clone(monitor));
        }
        Ok(mapper)
    }

    /// A cloneable provider that yields a fresh [`SqlMapper`] per call, for frameworks that
    /// inject per-request dependencies.
    pub fn mapper_factory(
        self: &Arc<Self>,
    ) -> impl Fn() -> BoxFuture<'static, Result<SqlMapper, SqlMapperError>> + Clone + Send + Sync + 'static
    {
        let manager = Arc::clone(self);
        move || {
            let manager = Arc::clone(&manager);
            Box::pin(async move { manager.mapper().await })
        }
    }

    /// Connect, run `body`, then close, whether or not `body` succeeded.
    ///
    /// # Errors
    /// Returns the connection error, or `body`'s error.
    pub async fn with_lifespan<F, Fut, R>(self: Arc<Self>, body: F) -> Result<R, SqlMapperError>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<R, SqlMapperError>>,
    {
        self.connect().await?;
        let result = body(Arc::clone(&self)).await;
        self.close().await;
        result
    }
}
