//! Clause terms and the parsed query object.
//!
//! Every type here is an immutable value built once by the parser. Terms keep
//! the text they were parsed from so backends can reuse it verbatim where the
//! target dialect's own path syntax matches.

use std::borrow::Cow;

use serde::Serialize;

use crate::error::Result;
use crate::path::{self, Segment};

/// A path operand: the select target, filter column, order key or update key.
///
/// # Examples
///
/// ```
/// use squril_core::{SelectTerm, Segment};
///
/// let term = SelectTerm::parse("team[0|score]").unwrap();
/// assert_eq!(term.bare_path, "team");
/// assert!(matches!(term.leaf(), Segment::ArraySpecificSingle { index: 0, .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectTerm {
    /// The path exactly as written.
    pub original: String,
    /// The dotted keys with any trailing array suffix removed.
    pub bare_path: String,
    /// Parsed segment chain; never empty.
    pub segments: Vec<Segment>,
}

impl SelectTerm {
    /// Parses a single path.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedQuery`](crate::QueryError::MalformedQuery)
    /// if the path is not valid.
    pub fn parse(input: &str) -> Result<Self> {
        let (bare_path, segments) = path::parse_path(input)?;
        Ok(Self {
            original: input.to_string(),
            bare_path,
            segments,
        })
    }

    /// The terminal segment, which alone decides how the term is lowered.
    pub fn leaf(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }

    /// Key names of the bare path, outermost first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bare_path.split('.')
    }

    /// Whether the path is a single top-level key.
    pub fn is_top_level_key(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Key { .. }])
    }
}

/// Comparison operator of a filter predicate.
///
/// The compound tokens `is.not`, `not.like`, `not.ilike` and `not.in` are the
/// only accepted combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Neq,
    Like,
    ILike,
    Not,
    Is,
    In,
    IsNot,
    NotLike,
    NotILike,
    NotIn,
}

impl Operator {
    /// Parse order: compound tokens first so `not.like` never reads as `not`.
    const ALL: [Operator; 15] = [
        Operator::IsNot,
        Operator::NotLike,
        Operator::NotILike,
        Operator::NotIn,
        Operator::Eq,
        Operator::Gte,
        Operator::Gt,
        Operator::Lte,
        Operator::Lt,
        Operator::Neq,
        Operator::Like,
        Operator::ILike,
        Operator::Not,
        Operator::Is,
        Operator::In,
    ];

    /// The token as written in a query string.
    pub fn token(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Neq => "neq",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Not => "not",
            Self::Is => "is",
            Self::In => "in",
            Self::IsNot => "is.not",
            Self::NotLike => "not.like",
            Self::NotILike => "not.ilike",
            Self::NotIn => "not.in",
        }
    }

    /// Looks up an operator by its exact token.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    /// Splits `op.literal` into the operator and the literal text.
    pub(crate) fn split_prefix(expr: &str) -> Option<(Self, &str)> {
        Self::ALL.into_iter().find_map(|op| {
            expr.strip_prefix(op.token())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|literal| (op, literal))
        })
    }

    /// Two-token forms such as `not.like`.
    pub fn is_compound(self) -> bool {
        self.token().contains('.')
    }

    /// Operators taking a bracketed list literal.
    pub fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }

    /// Operators whose literal is a glob pattern.
    pub fn is_pattern(self) -> bool {
        matches!(self, Self::Like | Self::ILike | Self::NotLike | Self::NotILike)
    }

    /// Operators that compare magnitudes and so benefit from numeric casts.
    pub fn is_magnitude(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Neq
        )
    }
}

/// Boolean combinator joining a predicate to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Classified literal operand of a filter predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal<'a> {
    /// Unquoted optional `-` followed by digits, of any magnitude.
    Integer(&'a str),
    /// The unquoted sentinel `null`.
    Null,
    /// Elements of a bracketed list, for `in`/`not.in`.
    List(Vec<&'a str>),
    /// Any other value; quoted literals always land here.
    Text(Cow<'a, str>),
}

/// One filter predicate of the `where` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhereTerm {
    /// Number of `(` opened before this predicate.
    pub groups_open: usize,
    /// Number of `)` closed after this predicate.
    pub groups_close: usize,
    /// `None` only for the first predicate.
    pub combinator: Option<Combinator>,
    pub operand: SelectTerm,
    pub operator: Operator,
    /// Literal operand exactly as written, quotes included.
    pub literal: String,
}

impl WhereTerm {
    /// Classifies the literal operand.
    ///
    /// # Examples
    ///
    /// ```
    /// use squril_core::{Literal, Query};
    ///
    /// let query = Query::parse("where=age=gte.21,and:name=eq.'21'").unwrap();
    /// let terms = query.filter.unwrap();
    /// assert_eq!(terms.first().literal_value(), Literal::Integer("21"));
    /// assert_eq!(terms.terms()[1].literal_value(), Literal::Text("21".into()));
    /// ```
    pub fn literal_value(&self) -> Literal<'_> {
        let raw = self.literal.as_str();
        if self.operator.is_list() {
            let inner = raw
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .unwrap_or(raw);
            return Literal::List(inner.split(',').collect());
        }
        if let Some(quoted) = unquote(raw) {
            return Literal::Text(quoted);
        }
        if raw == "null" {
            return Literal::Null;
        }
        if is_integer(raw) {
            Literal::Integer(raw)
        } else {
            Literal::Text(Cow::Borrowed(raw))
        }
    }

    /// The digits of an integer literal, if it is one.
    pub fn integer_literal(&self) -> Option<&str> {
        match self.literal_value() {
            Literal::Integer(n) => Some(n),
            _ => None,
        }
    }
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Strips single quotes from a quoted literal, collapsing `''` to `'`.
fn unquote(raw: &str) -> Option<Cow<'_, str>> {
    let inner = raw.strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.contains("''") {
        Some(Cow::Owned(inner.replace("''", "'")))
    } else {
        Some(Cow::Borrowed(inner))
    }
}

/// Sort direction of an order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One entry of the `order` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerm {
    pub operand: SelectTerm,
    pub direction: Direction,
}

/// The `range` clause.
///
/// Written as `start.end` but interpreted as a row offset and row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeTerm {
    pub start: u64,
    pub count: u64,
}

/// Ordered, non-empty sequence of terms of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Clause<T> {
    terms: Vec<T>,
}

impl<T> Clause<T> {
    /// Wraps parsed terms. Returns `None` when there are none.
    pub fn new(terms: Vec<T>) -> Option<Self> {
        if terms.is_empty() {
            None
        } else {
            Some(Self { terms })
        }
    }

    pub fn terms(&self) -> &[T] {
        &self.terms
    }

    pub fn first(&self) -> &T {
        &self.terms[0]
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Always `false`; clauses are never empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.terms.iter()
    }
}

impl<'a, T> IntoIterator for &'a Clause<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

/// A parsed query string. Each clause is absent when not given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Query {
    pub select: Option<Clause<SelectTerm>>,
    /// The `where` clause.
    #[serde(rename = "where")]
    pub filter: Option<Clause<WhereTerm>>,
    pub order: Option<Clause<OrderTerm>>,
    pub range: Option<Clause<RangeTerm>>,
    pub set: Option<Clause<SelectTerm>>,
}

impl Query {
    /// Parses a raw query string such as
    /// `select=name,tags[0]&where=age=gte.21&order=age.desc&range=0.20`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedQuery`](crate::QueryError::MalformedQuery)
    /// naming the first fragment that fails to parse.
    pub fn parse(input: &str) -> Result<Self> {
        crate::parser::parse_query(input)
    }
}

impl std::str::FromStr for Query {
    type Err = crate::QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
