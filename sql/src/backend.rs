//! The capability interface a SQL dialect implements.
//!
//! The generator only ever talks to a `&dyn Backend`. Each method lowers one
//! shape of term; which method is called is decided by the terminal segment
//! of the term's path (see [`crate::SqlGenerator`]).

use serde_json::Value;
use squril_core::{Operator, OrderTerm, Projection, Result, SelectTerm, WhereTerm};

use crate::fragment::SqlFragment;
use crate::operators;

/// Name of the column holding the JSON document.
pub const DATA_COLUMN: &str = "data";

/// Per-statement lowering context.
#[derive(Debug, Clone, Copy)]
pub struct LowerContext<'a> {
    /// Validated table name.
    pub table: &'a str,
}

/// Where a column reference is used.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    /// Left-hand side of a `where` predicate.
    Filter(&'a WhereTerm),
    /// Sort key of an `order by`.
    Order(&'a OrderTerm),
}

impl<'a> Column<'a> {
    pub fn operand(&self) -> &'a SelectTerm {
        match self {
            Self::Filter(term) => &term.operand,
            Self::Order(term) => &term.operand,
        }
    }
}

/// A SQL dialect able to lower query terms.
pub trait Backend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Function building a JSON array from its arguments.
    fn json_array_function(&self) -> &'static str;

    /// Placeholder text for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// One-time setup statements, in execution order.
    fn init_sql(&self) -> &'static [&'static str] {
        &[]
    }

    /// SQL spelling of a filter operator.
    fn operator_sql(&self, operator: Operator) -> &'static str {
        operators::operator_sql(operator)
    }

    /// Selects a path whose leaf is a plain key.
    fn key_selection(&self, ctx: &LowerContext<'_>, term: &SelectTerm) -> Result<SqlFragment>;

    /// Selects one fixed array element.
    fn array_selection(
        &self,
        ctx: &LowerContext<'_>,
        term: &SelectTerm,
        index: usize,
    ) -> Result<SqlFragment>;

    /// Projects fields from one array element or broadcasts over all of them.
    fn array_sub_selection(
        &self,
        ctx: &LowerContext<'_>,
        term: &SelectTerm,
        projection: Projection<'_>,
    ) -> Result<SqlFragment>;

    /// A scalar column reference for `where` and `order by`.
    fn column(&self, ctx: &LowerContext<'_>, column: Column<'_>) -> Result<SqlFragment>;

    /// The `set ...` part of an update replacing `key` with `value`.
    fn update(&self, ctx: &LowerContext<'_>, key: &str, value: &Value) -> Result<SqlFragment>;
}
