//! PostgreSQL dialect for structured query URI lowering.
//!
//! Targets tables with a `jsonb` document column named `data`. Array
//! projections rely on a stored helper function, so run [`INIT_SQL`] once
//! (for example from a migration) before executing compiled statements. The
//! `unique_data()` trigger routine expects a `uniq` text column on tables
//! that use it.
//!
//! ```
//! use squril_postgres::compile;
//!
//! let compiled = compile("people", "select=team[*|score]&where=age=gt.30", None).unwrap();
//! assert!(compiled.select().sql.contains("filter_array_elements(data #> '{team}', '{score}')"));
//! assert!(compiled.select().sql.ends_with("where (data #>> '{age}')::bigint > 30"));
//! ```

mod backend;
mod init;

use serde_json::Value;
use squril_core::Result;
use squril_sql::SqlGenerator;

pub use backend::PostgresBackend;
pub use init::{FILTER_ARRAY_ELEMENTS, INIT_SQL, UNIQUE_DATA};

/// Compiles `uri_query` against `table` for PostgreSQL.
pub fn compile(table: &str, uri_query: &str, payload: Option<&Value>) -> Result<SqlGenerator> {
    SqlGenerator::new(&PostgresBackend, table, uri_query, payload)
}
