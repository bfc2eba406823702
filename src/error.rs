use std::path::PathBuf;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Statement not found: {0}")]
    StatementNotFound(String),

    #[error("Duplicate statement name `{name}` ({detail})")]
    DuplicateStatement { name: String, detail: String },

    #[error("No value bound for named parameter :{0}")]
    MissingParameter(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Query returned no rows")]
    EmptyResult,

    #[error("Ambiguous scalar result: expected exactly one column, got {0}")]
    AmbiguousResult(usize),

    #[error("Row mapping error: {0}")]
    RowMapping(#[from] serde_json::Error),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl SqlMapperError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SqlMapperError::Io {
            path: path.into(),
            source,
        }
    }
}
