//! Query-string parser.
//!
//! A query string is a set of `clause=value` pairs joined by `&`:
//!
//! ```text
//! select=name,tags[0],team[*|score]
//! &where=((age=gte.21,or:name=like.*son),and:city=in.[oslo,bergen])
//! &order=age.desc
//! &range=0.20
//! &set=name
//! ```
//!
//! Values are percent-decoded after the string is split on `&`, so literals
//! may carry an encoded `&` (`%26`). Parsing fails fast: the first bad
//! fragment aborts the whole query.

use tracing::debug;

use crate::error::{QueryError, Result};
use crate::term::{
    Clause, Combinator, Direction, Operator, OrderTerm, Query, RangeTerm, SelectTerm, WhereTerm,
};

/// Parses a raw query string into a [`Query`].
pub fn parse_query(input: &str) -> Result<Query> {
    let mut query = Query::default();
    let mut seen: Vec<&str> = Vec::new();

    for pair in input.split('&').filter(|pair| !pair.is_empty()) {
        let (key, raw_value) = pair
            .split_once('=')
            .ok_or_else(|| QueryError::malformed(pair, "expected clause=value"))?;

        if seen.contains(&key) {
            return Err(QueryError::malformed(pair, format!("duplicate '{key}' clause")));
        }
        seen.push(key);

        let value = urlencoding::decode(raw_value)
            .map_err(|e| QueryError::malformed(pair, format!("invalid percent-encoding: {e}")))?;
        if value.is_empty() {
            continue;
        }

        match key {
            "select" => query.select = Clause::new(parse_select_clause(&value)?),
            "where" => query.filter = Clause::new(parse_where_clause(&value)?),
            "order" => query.order = Clause::new(vec![parse_order_term(&value)?]),
            "range" => query.range = Clause::new(vec![parse_range_term(&value)?]),
            "set" => query.set = Clause::new(vec![parse_set_term(&value)?]),
            other => {
                return Err(QueryError::malformed(pair, format!("unknown clause '{other}'")));
            }
        }
    }

    debug!(
        select = query.select.as_ref().map_or(0, Clause::len),
        filter = query.filter.as_ref().map_or(0, Clause::len),
        order = query.order.is_some(),
        range = query.range.is_some(),
        set = query.set.is_some(),
        "Parsed query string"
    );

    Ok(query)
}

/// Splits a clause value on top-level commas.
///
/// Commas inside `[...]` never split. When `quotes` is set, commas inside
/// `'...'` do not split either.
fn split_terms(value: &str, quotes: bool) -> Result<Vec<&str>> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (pos, ch) in value.char_indices() {
        match ch {
            '\'' if quotes => in_quote = !in_quote,
            _ if in_quote => {}
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| QueryError::malformed(value, "unbalanced ']'"))?;
            }
            ',' if depth == 0 => {
                terms.push(&value[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }

    if in_quote {
        return Err(QueryError::malformed(value, "unterminated quoted literal"));
    }
    if depth != 0 {
        return Err(QueryError::malformed(value, "unbalanced '['"));
    }
    terms.push(&value[start..]);

    if terms.iter().any(|term| term.is_empty()) {
        return Err(QueryError::malformed(value, "empty term"));
    }
    Ok(terms)
}

fn parse_select_clause(value: &str) -> Result<Vec<SelectTerm>> {
    split_terms(value, false)?
        .into_iter()
        .map(SelectTerm::parse)
        .collect()
}

fn parse_where_clause(value: &str) -> Result<Vec<WhereTerm>> {
    let mut terms = Vec::new();
    let mut depth = 0usize;

    for (position, raw) in split_terms(value, true)?.into_iter().enumerate() {
        let term = parse_where_term(raw, position == 0)?;
        depth += term.groups_open;
        depth = depth
            .checked_sub(term.groups_close)
            .ok_or_else(|| QueryError::malformed(raw, "closes a group that was never opened"))?;
        terms.push(term);
    }

    if depth != 0 {
        return Err(QueryError::malformed(value, "unclosed group"));
    }
    Ok(terms)
}

/// Parses `[and:|or:](*path=op.literal)*`.
fn parse_where_term(raw: &str, first: bool) -> Result<WhereTerm> {
    let (combinator, rest) = if let Some(rest) = raw.strip_prefix("and:") {
        (Some(Combinator::And), rest)
    } else if let Some(rest) = raw.strip_prefix("or:") {
        (Some(Combinator::Or), rest)
    } else {
        (None, raw)
    };

    match (first, combinator) {
        (true, Some(_)) => {
            return Err(QueryError::malformed(raw, "the first predicate cannot take a combinator"));
        }
        (false, None) => {
            return Err(QueryError::malformed(raw, "expected 'and:' or 'or:' before predicate"));
        }
        _ => {}
    }

    let body = rest.trim_start_matches('(');
    let groups_open = rest.len() - body.len();

    let (path, expr) = body
        .split_once('=')
        .ok_or_else(|| QueryError::malformed(raw, "expected path=operator.value"))?;
    let operand = SelectTerm::parse(path)?;

    let (operator, tail) = Operator::split_prefix(expr)
        .ok_or_else(|| QueryError::malformed(raw, format!("unknown operator in '{expr}'")))?;
    let (literal, groups_close) = split_group_close(raw, tail)?;

    if literal.is_empty() {
        return Err(QueryError::malformed(raw, "missing literal; use '' for an empty string"));
    }
    if operator.is_list() {
        validate_list(raw, literal)?;
    }

    Ok(WhereTerm {
        groups_open,
        groups_close,
        combinator,
        operand,
        operator,
        literal: literal.to_string(),
    })
}

/// Separates the literal from trailing group-closing parentheses.
fn split_group_close<'a>(raw: &str, tail: &'a str) -> Result<(&'a str, usize)> {
    if tail.starts_with('\'') {
        let end = tail
            .rfind('\'')
            .filter(|&end| end > 0)
            .ok_or_else(|| QueryError::malformed(raw, "unterminated quoted literal"))?;
        let closers = &tail[end + 1..];
        if !closers.chars().all(|c| c == ')') {
            return Err(QueryError::malformed(raw, "unexpected text after quoted literal"));
        }
        Ok((&tail[..=end], closers.len()))
    } else {
        let literal = tail.trim_end_matches(')');
        Ok((literal, tail.len() - literal.len()))
    }
}

fn validate_list(raw: &str, literal: &str) -> Result<()> {
    let inner = literal
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| QueryError::malformed(raw, "list operators need a [a,b,...] literal"))?;
    if inner.split(',').any(str::is_empty) {
        return Err(QueryError::malformed(raw, "empty element in list literal"));
    }
    Ok(())
}

fn parse_order_term(value: &str) -> Result<OrderTerm> {
    let terms = split_terms(value, false)?;
    if terms.len() > 1 {
        return Err(QueryError::malformed(value, "only one order term is supported"));
    }

    let (path, direction) = value
        .rsplit_once('.')
        .ok_or_else(|| QueryError::malformed(value, "expected path.asc or path.desc"))?;
    let direction = match direction {
        "asc" => Direction::Asc,
        "desc" => Direction::Desc,
        other => {
            return Err(QueryError::malformed(value, format!("unknown direction '{other}'")));
        }
    };

    Ok(OrderTerm {
        operand: SelectTerm::parse(path)?,
        direction,
    })
}

fn parse_range_term(value: &str) -> Result<RangeTerm> {
    let (start, end) = value
        .split_once('.')
        .ok_or_else(|| QueryError::malformed(value, "expected start.end"))?;
    let parse = |part: &str| {
        part.parse::<u64>()
            .map_err(|_| QueryError::malformed(value, format!("'{part}' is not a non-negative integer")))
    };
    Ok(RangeTerm {
        start: parse(start)?,
        count: parse(end)?,
    })
}

fn parse_set_term(value: &str) -> Result<SelectTerm> {
    let term = SelectTerm::parse(value)?;
    if !term.is_top_level_key() {
        return Err(QueryError::malformed(value, "set takes exactly one top-level key"));
    }
    Ok(term)
}
