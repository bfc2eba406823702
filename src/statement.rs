//! Statements bound to a result type, declared once and reused.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::SqlMapperError;
use crate::mapper::SqlMapper;
use crate::params::NamedParams;
use crate::registry::StatementRegistry;
use crate::types::ExecOutcome;

/// A query whose rows map to `T`.
///
/// ```rust
/// use serde::Deserialize;
/// use sql_mapper::SelectStatement;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// static GET_USER: SelectStatement<User> =
///     SelectStatement::new("SELECT id, name FROM users WHERE id = :id");
/// # assert!(GET_USER.sql().contains(":id"));
/// ```
pub struct SelectStatement<T> {
    sql: Cow<'static, str>,
    _row: PhantomData<fn() -> T>,
}

impl<T> SelectStatement<T> {
    #[must_use]
    pub const fn new(sql: &'static str) -> Self {
        Self {
            sql: Cow::Borrowed(sql),
            _row: PhantomData,
        }
    }

    /// Statement registered under `name`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::StatementNotFound` if no statement has that name.
    pub fn from_registry(registry: &StatementRegistry, name: &str) -> Result<Self, SqlMapperError> {
        Ok(Self {
            sql: Cow::Owned(registry.get(name)?.to_string()),
            _row: PhantomData,
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl<T: DeserializeOwned> SelectStatement<T> {
    /// # Errors
    /// See [`SqlMapper::fetch_one`].
    pub async fn fetch_one(
        &self,
        mapper: &mut SqlMapper,
        params: &NamedParams,
    ) -> Result<Option<T>, SqlMapperError> {
        mapper.fetch_one(&self.sql, params).await
    }

    /// # Errors
    /// See [`SqlMapper::fetch_all`].
    pub async fn fetch_all(
        &self,
        mapper: &mut SqlMapper,
        params: &NamedParams,
    ) -> Result<Vec<T>, SqlMapperError> {
        mapper.fetch_all(&self.sql, params).await
    }
}

impl<T> Clone for SelectStatement<T> {
    fn clone(&self) -> Self {
        Self {
            sql: self.sql.clone(),
            _row: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SelectStatement<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectStatement")
            .field("sql", &self.sql)
            .field("row", &std::any::type_name::<T>())
            .finish()
    }
}

/// A mutating statement.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    sql: Cow<'static, str>,
}

impl UpdateStatement {
    #[must_use]
    pub const fn new(sql: &'static str) -> Self {
        Self {
            sql: Cow::Borrowed(sql),
        }
    }

    /// # Errors
    /// Returns `SqlMapperError::StatementNotFound` if no statement has that name.
    pub fn from_registry(registry: &StatementRegistry, name: &str) -> Result<Self, SqlMapperError> {
        Ok(Self {
            sql: Cow::Owned(registry.get(name)?.to_string()),
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// # Errors
    /// See [`SqlMapper::execute`].
    pub async fn execute(
        &self,
        mapper: &mut SqlMapper,
        params: &NamedParams,
    ) -> Result<ExecOutcome, SqlMapperError> {
        mapper.execute(&self.sql, params).await
    }
}
