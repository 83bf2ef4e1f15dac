//! SQLite dialect for structured query URI lowering.
//!
//! Targets tables with a JSON document column named `data`, queried through
//! SQLite's built-in JSON functions (`json_extract`, `json_each`,
//! `json_patch`). The crate needs no schema setup of its own.
//!
//! # Quick start
//!
//! ```
//! use squril_sqlite::compile;
//!
//! let compiled = compile("people", "select=name,team[*|score]&range=0.10", None).unwrap();
//! assert!(compiled.select().sql.starts_with("select json_array(json_extract(data, '$.name'), "));
//! assert!(compiled.select().sql.ends_with("from people limit 10 offset 0"));
//! ```
//!
//! Statements carry their values separately; use [`bind`] to execute them
//! with rusqlite.

mod backend;
mod params;

use serde_json::Value;
use squril_core::Result;
use squril_sql::SqlGenerator;

pub use backend::SqliteBackend;
pub use params::{bind, to_sql_values};

/// Compiles `uri_query` against `table` for SQLite.
pub fn compile(table: &str, uri_query: &str, payload: Option<&Value>) -> Result<SqlGenerator> {
    SqlGenerator::new(&SqliteBackend, table, uri_query, payload)
}
