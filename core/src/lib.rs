//! Grammar and parser for the structured query URI language.
//!
//! A query string selects, filters, orders, pages and updates JSON documents
//! stored in a single column. This crate turns that string into a typed
//! [`Query`]; the `squril-sql` crate lowers it to SQL for a backend.
//!
//! - [`Segment`] — one step of a dotted JSON path, including array indexing
//!   (`tags[0]`) and broadcasting (`team[*|score]`).
//! - [`SelectTerm`], [`WhereTerm`], [`OrderTerm`], [`RangeTerm`] — the clause
//!   entries built from paths.
//! - [`Query`] — up to five clauses (`select`, `where`, `order`, `range`,
//!   `set`), each an ordered, non-empty [`Clause`].
//!
//! # Example
//!
//! ```
//! use squril_core::{Direction, Operator, Query};
//!
//! let query = Query::parse("select=name,tags[0]&where=age=gte.21&order=age.desc&range=0.20")
//!     .unwrap();
//!
//! assert_eq!(query.select.as_ref().unwrap().len(), 2);
//! assert_eq!(query.filter.as_ref().unwrap().first().operator, Operator::Gte);
//! assert_eq!(query.order.as_ref().unwrap().first().direction, Direction::Desc);
//! assert_eq!(query.range.as_ref().unwrap().first().count, 20);
//! ```

mod error;
mod parser;
mod path;
mod term;

pub use error::{QueryError, Result};
pub use path::{Projection, Segment, is_valid_key};
pub use term::{
    Clause, Combinator, Direction, Literal, Operator, OrderTerm, Query, RangeTerm, SelectTerm,
    WhereTerm,
};
