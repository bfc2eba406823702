use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dsn::Dsn;
use crate::error::SqlMapperError;
use crate::lifecycle::MapperManager;
use crate::registry::CollisionPolicy;

/// Environment variable holding the DSN.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable naming the `.sql` directory.
pub const ENV_SQL_DIR: &str = "SQL_MAPPER_SQL_DIR";
/// Environment variable with the slow-query threshold in seconds.
pub const ENV_SLOW_QUERY_SECS: &str = "SQL_MAPPER_SLOW_QUERY_SECS";
/// Environment variable with the maximum pool size.
pub const ENV_POOL_SIZE: &str = "SQL_MAPPER_POOL_SIZE";

const DEFAULT_POOL_SIZE: u32 = 10;

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

/// Settings for a [`MapperManager`].
///
/// Deserializable from any serde format; only `dsn` is required.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    pub dsn: String,
    /// Directory whose `*.sql` files are loaded into the registry at startup.
    #[serde(default)]
    pub sql_dir: Option<PathBuf>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Calls at or above this many seconds count as slow. Monitoring is off when unset.
    #[serde(default)]
    pub slow_query_threshold_secs: Option<f64>,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl fmt::Debug for MapperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dsn = Dsn::parse(&self.dsn).map_or_else(|_| "<invalid>".to_string(), |d| d.to_string());
        f.debug_struct("MapperConfig")
            .field("dsn", &dsn)
            .field("sql_dir", &self.sql_dir)
            .field("pool_size", &self.pool_size)
            .field("slow_query_threshold_secs", &self.slow_query_threshold_secs)
            .field("collision_policy", &self.collision_policy)
            .finish()
    }
}

impl MapperConfig {
    #[must_use]
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            sql_dir: None,
            pool_size: DEFAULT_POOL_SIZE,
            slow_query_threshold_secs: None,
            collision_policy: CollisionPolicy::default(),
        }
    }

    #[must_use]
    pub fn builder(dsn: impl Into<String>) -> MapperConfigBuilder {
        MapperConfigBuilder::new(dsn)
    }

    /// Read `DATABASE_URL`, `SQL_MAPPER_SQL_DIR`, `SQL_MAPPER_SLOW_QUERY_SECS` and
    /// `SQL_MAPPER_POOL_SIZE`.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if `DATABASE_URL` is missing or a numeric variable
    /// does not parse.
    pub fn from_env() -> Result<Self, SqlMapperError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SqlMapperError> {
        let dsn = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SqlMapperError::ConfigError(format!("{ENV_DATABASE_URL} is not set")))?;
        let mut config = Self::new(dsn);
        config.sql_dir = lookup(ENV_SQL_DIR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(raw) = lookup(ENV_SLOW_QUERY_SECS) {
            let secs = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| {
                    SqlMapperError::ConfigError(format!(
                        "{ENV_SLOW_QUERY_SECS} must be a non-negative number of seconds, got `{raw}`"
                    ))
                })?;
            config.slow_query_threshold_secs = Some(secs);
        }
        if let Some(raw) = lookup(ENV_POOL_SIZE) {
            config.pool_size = raw.trim().parse::<u32>().map_err(|e| {
                SqlMapperError::ConfigError(format!("{ENV_POOL_SIZE} `{raw}`: {e}"))
            })?;
        }
        Ok(config)
    }

    /// Slow-query threshold, if monitoring is enabled.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` if `slow_query_threshold_secs` is negative or not
    /// finite.
    pub fn slow_query_threshold(&self) -> Result<Option<Duration>, SqlMapperError> {
        self.slow_query_threshold_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    SqlMapperError::ConfigError(format!(
                        "slow_query_threshold_secs must be a non-negative number of seconds, got {secs}"
                    ))
                })
            })
            .transpose()
    }

    /// Reject settings the pool or the monitor cannot work with.
    ///
    /// # Errors
    /// Returns `SqlMapperError::ConfigError` for a zero `pool_size` or an invalid slow-query
    /// threshold.
    pub fn validate(&self) -> Result<(), SqlMapperError> {
        if self.pool_size == 0 {
            return Err(SqlMapperError::ConfigError(
                "pool_size must be at least 1".into(),
            ));
        }
        self.slow_query_threshold().map(|_| ())
    }
}

/// Fluent builder for [`MapperConfig`].
#[derive(Debug, Clone)]
pub struct MapperConfigBuilder {
    config: MapperConfig,
}

impl MapperConfigBuilder {
    #[must_use]
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            config: MapperConfig::new(dsn),
        }
    }

    #[must_use]
    pub fn sql_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sql_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    #[must_use]
    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.config.slow_query_threshold_secs = Some(threshold.as_secs_f64());
        self
    }

    #[must_use]
    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    #[must_use]
    pub fn finish(self) -> MapperConfig {
        self.config
    }

    /// Build an unconnected [`MapperManager`].
    ///
    /// # Errors
    ///
    /// See [`MapperManager::new`].
    pub fn build(self) -> Result<MapperManager, SqlMapperError> {
        MapperManager::new(self.finish())
    }
}
