//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{MapperConfig, MapperConfigBuilder};
pub use crate::error::SqlMapperError;
pub use crate::lifecycle::MapperManager;
pub use crate::mapper::SqlMapper;
pub use crate::monitor::{MonitorSnapshot, QueryMonitor};
pub use crate::named_params;
pub use crate::params::NamedParams;
pub use crate::registry::{CollisionPolicy, StatementRegistry};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::session::SqlSession;
pub use crate::statement::{SelectStatement, UpdateStatement};
pub use crate::types::{DatabaseType, ExecOutcome, RowValues};
