//! Error types for query parsing and lowering.
//!
//! One error type is shared by the parser and every SQL backend so callers
//! can handle a failed compilation without caring which stage rejected it.

use thiserror::Error;

/// Errors raised while parsing a query string or lowering it to SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A clause, term, path or operator could not be parsed.
    #[error("malformed query at '{fragment}': {reason}")]
    MalformedQuery {
        /// The offending piece of input, as written.
        fragment: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The update payload does not match the `set` clause.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// A backend was handed a term shape it cannot lower.
    #[error("unsupported term: {0}")]
    UnsupportedTerm(String),

    /// Table name contains characters that cannot be used unquoted in SQL.
    #[error("invalid table name '{0}': must be alphanumeric/underscore, optionally schema-qualified")]
    InvalidTableName(String),
}

impl QueryError {
    pub(crate) fn malformed(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedQuery {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for results with [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;
