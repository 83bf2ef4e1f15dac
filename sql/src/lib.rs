//! Backend-agnostic SQL lowering for structured query URI terms.
//!
//! A [`Backend`] implements one lowering rule per term shape (key selection,
//! fixed-index selection, array sub-selection/broadcast, column reference and
//! update). [`SqlGenerator`] maps those rules over a parsed
//! [`Query`](squril_core::Query) and assembles complete `select`, `update`
//! and `delete` [`Statement`]s.
//!
//! Values taken from the query string or the update payload are never
//! written into SQL text: they travel as [`Param`]s next to the statement
//! and are bound by the caller's database driver.
//!
//! # Modules
//!
//! - **`backend`** — the [`Backend`] capability trait
//! - **`fragment`** — [`SqlFragment`], SQL text interleaved with bound values
//! - **`operators`** — the fixed operator table and literal rendering
//! - **`generator`** — clause and statement assembly

mod backend;
mod fragment;
mod generator;
mod operators;

pub use backend::{Backend, Column, DATA_COLUMN, LowerContext};
pub use fragment::{Param, SqlFragment};
pub use generator::{SqlGenerator, Statement, validate_table_name};
pub use operators::{lower_literal, operator_sql};
