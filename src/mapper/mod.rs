//! The execution facade: named-parameter SQL in, typed models out.

mod transaction;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use serde::de::DeserializeOwned;

use crate::dsn::Dsn;
use crate::error::SqlMapperError;
use crate::monitor::QueryMonitor;
use crate::params::NamedParams;
use crate::placeholders::BoundStatement;
use crate::pool::DbPool;
use crate::registry::StatementRegistry;
use crate::results::{CustomDbRow, ResultSet};
use crate::session::SqlSession;
use crate::types::{ExecOutcome, RowValues};

/// Runs parameterized SQL on one connection and maps rows to models.
///
/// A mapper owns its connection exclusively, so its statements run one after another. Create one
/// per request (see [`MapperManager::mapper`](crate::MapperManager::mapper)) or inject a session
/// with [`SqlMapper::new`].
///
/// ```rust,no_run
/// use serde::Deserialize;
/// use sql_mapper::prelude::*;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// # async fn demo() -> Result<(), SqlMapperError> {
/// let mut mapper = SqlMapper::from_dsn("sqlite:///app.db")?;
/// mapper.connect().await?;
/// let user: Option<User> = mapper
///     .fetch_one("SELECT id, name FROM users WHERE id = :id", &named_params! { "id" => 1 })
///     .await?;
/// mapper.close().await;
/// # Ok(())
/// # }
/// ```
pub struct SqlMapper {
    session: Option<Box<dyn SqlSession>>,
    dsn: Option<Dsn>,
    registry: Arc<StatementRegistry>,
    monitor: Option<Arc<QueryMonitor>>,
    in_transaction: bool,
    tx_abandoned: Arc<AtomicBool>,
}

impl fmt::Debug for SqlMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlMapper")
            .field("connected", &self.session.is_some())
            .field("dsn", &self.dsn.as_ref().map(ToString::to_string))
            .field("statements", &self.registry.len())
            .field("monitored", &self.monitor.is_some())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl SqlMapper {
    /// Facade over an already-open session.
    #[must_use]
    pub fn new(session: Box<dyn SqlSession>) -> Self {
        Self {
            session: Some(session),
            dsn: None,
            registry: Arc::new(StatementRegistry::new()),
            monitor: None,
            in_transaction: false,
            tx_abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Unconnected facade for `dsn`; call [`connect`](Self::connect) before running statements.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if the DSN is malformed or names a backend this
    /// build lacks.
    pub fn from_dsn(dsn: &str) -> Result<Self, SqlMapperError> {
        let dsn = Dsn::parse(dsn)?;
        dsn.database_type()?;
        Ok(Self {
            session: None,
            dsn: Some(dsn),
            registry: Arc::new(StatementRegistry::new()),
            monitor: None,
            in_transaction: false,
            tx_abandoned: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<StatementRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<QueryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Open a dedicated connection for a facade built with [`from_dsn`](Self::from_dsn).
    /// Does nothing when already connected.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConnectionError` if there is no DSN or the connection fails.
    pub async fn connect(&mut self) -> Result<(), SqlMapperError> {
        if self.session.is_some() {
            return Ok(());
        }
        let dsn = self.dsn.as_ref().ok_or_else(|| {
            SqlMapperError::ConnectionError("mapper was created without a DSN".into())
        })?;
        let pool = DbPool::connect(dsn, 1).await?;
        let conn = pool.get_connection().await?;
        tracing::info!(dsn = %dsn, "mapper connected");
        self.session = Some(Box::new(conn));
        Ok(())
    }

    /// Release the connection. An open transaction is rolled back first; a rollback failure is
    /// logged, not returned.
    pub async fn close(&mut self) {
        if self.in_transaction
            && let Some(session) = self.session.as_mut()
            && let Err(e) = session.rollback().await
        {
            tracing::warn!(error = %e, "rollback on close failed");
        }
        self.in_transaction = false;
        if self.session.take().is_some() {
            tracing::info!("mapper closed");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<StatementRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn monitor(&self) -> Option<&Arc<QueryMonitor>> {
        self.monitor.as_ref()
    }

    /// Replace the registry with every `*.sql` file found in `dir`.
    ///
    /// # Errors
    /// Returns the registry's load errors; the current registry is kept on failure.
    pub fn set_sql_dir(&mut self, dir: impl Into<PathBuf>) -> Result<usize, SqlMapperError> {
        let mut registry = StatementRegistry::with_root(dir);
        let count = registry.load_dir()?;
        self.registry = Arc::new(registry);
        Ok(count)
    }

    /// Read a SQL file (or one named block of it) relative to the registry's directory.
    ///
    /// # Errors
    /// See [`StatementRegistry::load_sql`].
    pub fn load_sql(&self, filename: &str, name: Option<&str>) -> Result<String, SqlMapperError> {
        self.registry.load_sql(filename, name)
    }

    /// Registered SQL for `name`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::StatementNotFound` if no statement has that name.
    pub fn statement(&self, name: &str) -> Result<Arc<str>, SqlMapperError> {
        self.registry.get(name)
    }

    /// First row mapped to `T`, or `None` when nothing matched.
    ///
    /// # Errors
    /// Returns `MissingParameter` before execution, driver errors unchanged, or `RowMapping` if
    /// the row does not fit `T`.
    pub async fn fetch_one<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Option<T>, SqlMapperError> {
        let rows = self.run_select("fetch_one", sql, params).await?;
        rows.first().map(CustomDbRow::deserialize).transpose()
    }

    /// First row as a raw [`CustomDbRow`].
    ///
    /// # Errors
    /// Returns `MissingParameter` before execution or driver errors unchanged.
    pub async fn fetch_one_row(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Option<CustomDbRow>, SqlMapperError> {
        let rows = self.run_select("fetch_one", sql, params).await?;
        Ok(rows.into_iter().next())
    }

    /// Every row mapped to `T`; an empty table gives an empty vector.
    ///
    /// # Errors
    /// Returns `MissingParameter` before execution, driver errors unchanged, or `RowMapping` on
    /// the first row that does not fit `T`.
    pub async fn fetch_all<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Vec<T>, SqlMapperError> {
        self.run_select("fetch_all", sql, params)
            .await?
            .deserialize_all()
    }

    /// Every row with column names, even when empty.
    ///
    /// # Errors
    /// Returns `MissingParameter` before execution or driver errors unchanged.
    pub async fn fetch_all_rows(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlMapperError> {
        self.run_select("fetch_all", sql, params).await
    }

    /// The single value of the first row.
    ///
    /// # Errors
    /// Returns `AmbiguousResult` if the query projects more than one column, `EmptyResult` if it
    /// returned no rows, plus the errors of [`fetch_one`](Self::fetch_one).
    pub async fn fetch_val(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<RowValues, SqlMapperError> {
        let rows = self.run_select("fetch_val", sql, params).await?;
        if rows.column_count() > 1 {
            return Err(SqlMapperError::AmbiguousResult(rows.column_count()));
        }
        let row = rows.into_iter().next().ok_or(SqlMapperError::EmptyResult)?;
        if row.len() != 1 {
            return Err(SqlMapperError::AmbiguousResult(row.len()));
        }
        Ok(row.rows.into_iter().next().unwrap_or(RowValues::Null))
    }

    /// [`fetch_val`](Self::fetch_val) deserialized into `V`.
    ///
    /// # Errors
    /// As [`fetch_val`](Self::fetch_val), plus `RowMapping` if the value does not fit `V`.
    pub async fn fetch_val_as<V: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<V, SqlMapperError> {
        let value = self.fetch_val(sql, params).await?;
        Ok(serde_json::from_value(value.to_json())?)
    }

    /// Run a mutating statement.
    ///
    /// # Errors
    /// Returns `MissingParameter` before execution or driver errors unchanged.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<ExecOutcome, SqlMapperError> {
        self.recover_abandoned().await;
        let session = self.session_mut()?;
        let bound = BoundStatement::bind(sql, params, session.placeholder_style())?;
        log_statement("execute", &bound, params);
        let started = Instant::now();
        let result = session.execute(&bound.sql, &bound.values).await;
        self.observe(sql, started);
        result
    }

    /// Run a parameterless script such as schema DDL, one `;`-separated statement at a time.
    ///
    /// # Errors
    /// Returns driver errors unchanged.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        self.recover_abandoned().await;
        let session = self.session_mut()?;
        tracing::debug!(op = "execute_batch", sql, "executing statement");
        let started = Instant::now();
        let result = session.execute_batch(sql).await;
        self.observe(sql, started);
        result
    }

    /// Alias of [`fetch_one`](Self::fetch_one).
    ///
    /// # Errors
    /// See [`fetch_one`](Self::fetch_one).
    pub async fn select_one<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Option<T>, SqlMapperError> {
        self.fetch_one(sql, params).await
    }

    /// Alias of [`fetch_all`](Self::fetch_all).
    ///
    /// # Errors
    /// See [`fetch_all`](Self::fetch_all).
    pub async fn select_list<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<Vec<T>, SqlMapperError> {
        self.fetch_all(sql, params).await
    }

    /// Run an `INSERT`; on `SQLite` the outcome carries the new rowid.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn insert(
        &mut self,
        sql: &str,
        params: &NamedParams,
    ) -> Result<ExecOutcome, SqlMapperError> {
        self.execute(sql, params).await
    }

    /// Run an `UPDATE` and return the number of rows changed.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn update(&mut self, sql: &str, params: &NamedParams) -> Result<u64, SqlMapperError> {
        Ok(self.execute(sql, params).await?.rows_affected)
    }

    /// Run a `DELETE` and return the number of rows removed.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn delete(&mut self, sql: &str, params: &NamedParams) -> Result<u64, SqlMapperError> {
        Ok(self.execute(sql, params).await?.rows_affected)
    }

    async fn run_select(
        &mut self,
        op: &'static str,
        sql: &str,
        params: &NamedParams,
    ) -> Result<ResultSet, SqlMapperError> {
        self.recover_abandoned().await;
        let session = self.session_mut()?;
        let bound = BoundStatement::bind(sql, params, session.placeholder_style())?;
        log_statement(op, &bound, params);
        let started = Instant::now();
        let result = session.select(&bound.sql, &bound.values).await;
        self.observe(sql, started);
        result
    }

    fn session_mut(&mut self) -> Result<&mut Box<dyn SqlSession>, SqlMapperError> {
        self.session
            .as_mut()
            .ok_or_else(|| SqlMapperError::ConnectionError("mapper is not connected".into()))
    }

    fn observe(&self, sql: &str, started: Instant) {
        if let Some(monitor) = &self.monitor {
            monitor.record(sql, started.elapsed());
        }
    }
}

fn log_statement(op: &'static str, bound: &BoundStatement<'_>, params: &NamedParams) {
    tracing::debug!(
        op,
        sql = %bound.sql,
        params = ?params.names().collect::<Vec<_>>(),
        "executing statement"
    );
}

impl Drop for SqlMapper {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        // the connection goes back to the pool only after the rollback ran
        if let Some(mut session) = self.session.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            handle.spawn(async move {
                if let Err(e) = session.rollback().await {
                    tracing::warn!(error = %e, "rollback of dropped transaction failed");
                }
            });
        } else {
            tracing::warn!("mapper dropped inside a transaction outside a runtime");
        }
    }
}
