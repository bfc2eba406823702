//! A thin SQL mapper over `SQLite` and Postgres.
//!
//! Write SQL with `:name` placeholders, keep it in `.sql` files under `-- name=` markers, and map
//! rows onto serde models. Pooling and wire protocols stay with `bb8`, `rusqlite` and
//! `tokio-postgres`.

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one of the `sqlite` or `postgres` features");

pub mod config;
pub mod de;
pub mod dsn;
pub mod error;
pub mod lifecycle;
pub mod mapper;
pub mod monitor;
pub mod params;
pub mod placeholders;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod session;
pub mod statement;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{MapperConfig, MapperConfigBuilder};
pub use dsn::{Dsn, PostgresDsn, SqliteTarget};
pub use error::SqlMapperError;
pub use lifecycle::MapperManager;
pub use mapper::SqlMapper;
pub use monitor::{MonitorSnapshot, QueryMonitor, QueryStatistic};
pub use params::NamedParams;
pub use placeholders::{BoundStatement, ParsedStatement, PlaceholderStyle, parse_named};
pub use pool::{DbPool, MapperConnection};
pub use registry::{CollisionPolicy, StatementEntry, StatementRegistry};
pub use results::{CustomDbRow, ResultSet};
pub use session::SqlSession;
pub use statement::{SelectStatement, UpdateStatement};
pub use types::{DatabaseType, ExecOutcome, RowValues};
