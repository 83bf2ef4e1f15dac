//! Parameter-bound SQL fragments.
//!
//! Lowering never splices user values into SQL text. A [`SqlFragment`] keeps
//! SQL text and bound [`Param`]s interleaved in order; placeholders are only
//! numbered when a whole statement is rendered, so the same fragment can sit
//! at different positions in different statements.

use serde::Serialize;
use serde_json::Value;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Param {
    /// A text value.
    Text(String),
    /// A JSON document, bound as its serialized text.
    Json(Value),
}

impl Param {
    /// The text handed to the database driver.
    pub fn to_sql_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Param(Param),
}

/// SQL text interleaved with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pieces: Vec<Piece>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment consisting of SQL text only.
    pub fn sql(text: impl Into<String>) -> Self {
        let mut fragment = Self::new();
        fragment.push_sql(text);
        fragment
    }

    /// A fragment consisting of one bound parameter.
    pub fn param(param: Param) -> Self {
        let mut fragment = Self::new();
        fragment.push_param(param);
        fragment
    }

    pub fn push_sql(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        match self.pieces.last_mut() {
            Some(Piece::Sql(last)) => last.push_str(&text),
            _ => self.pieces.push(Piece::Sql(text)),
        }
        self
    }

    pub fn push_param(&mut self, param: Param) -> &mut Self {
        self.pieces.push(Piece::Param(param));
        self
    }

    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        for piece in other.pieces {
            match piece {
                Piece::Sql(text) => self.push_sql(text),
                Piece::Param(param) => self.push_param(param),
            };
        }
        self
    }

    /// Joins fragments with `separator`, skipping empty ones.
    pub fn join(fragments: impl IntoIterator<Item = SqlFragment>, separator: &str) -> Self {
        let mut out = Self::new();
        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
            if !out.is_empty() {
                out.push_sql(separator);
            }
            out.append(fragment);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Bound parameters in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Param(param) => Some(param),
            Piece::Sql(_) => None,
        })
    }

    /// Renders SQL text, numbering placeholders from 1 with `placeholder`.
    pub fn render(&self, placeholder: impl Fn(usize) -> String) -> (String, Vec<Param>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for piece in &self.pieces {
            match piece {
                Piece::Sql(text) => sql.push_str(text),
                Piece::Param(param) => {
                    params.push(param.clone());
                    sql.push_str(&placeholder(params.len()));
                }
            }
        }
        (sql, params)
    }
}
