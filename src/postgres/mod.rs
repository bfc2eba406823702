// Postgres backend
//
// - config: bb8 connection manager built from a parsed DSN
// - params: `ToSql` for `RowValues`
// - query: result extraction
// - executor: statement execution on a pooled client

pub mod config;
pub mod executor;
pub mod params;
pub mod query;

pub use config::{PgManager, PgPooledConnection};
pub use executor::{execute_batch, execute_dml, execute_select};
pub use params::Params;
pub use query::{build_result_set, postgres_extract_value};
