//! Dotted JSON path grammar.
//!
//! A path is one or more dot-separated keys, optionally followed by a single
//! trailing array suffix:
//!
//! | suffix | segment |
//! |---|---|
//! | `[2]` | [`Segment::ArraySpecific`] |
//! | `[2\|f]`, `[2].f` | [`Segment::ArraySpecificSingle`] |
//! | `[2\|f,g]` | [`Segment::ArraySpecificMultiple`] |
//! | `[*\|f]`, `[*].f` | [`Segment::ArrayBroadcastSingle`] |
//! | `[*\|f,g]` | [`Segment::ArrayBroadcastMultiple`] |
//!
//! Keys are restricted to `[A-Za-z0-9_-]+`, which keeps every path safe to
//! embed in backend path syntax. `null` (any case) is reserved since array
//! literals read it as a missing element.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{QueryError, Result};

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex must compile"));

static ARRAY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<index>\*|\d+)(?:\|(?P<fields>[^\]]*))?\](?:\.(?P<field>.*))?$")
        .expect("static regex must compile")
});

/// One step of a JSON path chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// A bare property name.
    Key { name: String },
    /// One fixed array element, no projection.
    ArraySpecific { index: usize },
    /// One fixed array element, projecting one sub-field.
    ArraySpecificSingle { index: usize, field: String },
    /// One fixed array element, projecting two or more sub-fields.
    ArraySpecificMultiple { index: usize, fields: Vec<String> },
    /// Every array element, projecting one sub-field from each.
    ArrayBroadcastSingle { field: String },
    /// Every array element, projecting two or more sub-fields from each.
    ArrayBroadcastMultiple { fields: Vec<String> },
}

/// Borrowed view of a projecting array segment.
///
/// `index` is `None` for broadcasts. `fields` always has at least one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection<'a> {
    pub index: Option<usize>,
    pub fields: &'a [String],
}

impl Projection<'_> {
    /// Whether the projection yields a tuple per element rather than a scalar.
    pub fn is_multiple(&self) -> bool {
        self.fields.len() > 1
    }
}

impl Segment {
    /// Returns the projection carried by the four `*Single`/`*Multiple`
    /// variants, or `None` for keys and plain indexing.
    pub fn projection(&self) -> Option<Projection<'_>> {
        match self {
            Self::Key { .. } | Self::ArraySpecific { .. } => None,
            Self::ArraySpecificSingle { index, field } => Some(Projection {
                index: Some(*index),
                fields: std::slice::from_ref(field),
            }),
            Self::ArraySpecificMultiple { index, fields } => Some(Projection {
                index: Some(*index),
                fields,
            }),
            Self::ArrayBroadcastSingle { field } => Some(Projection {
                index: None,
                fields: std::slice::from_ref(field),
            }),
            Self::ArrayBroadcastMultiple { fields } => Some(Projection {
                index: None,
                fields,
            }),
        }
    }

    /// Builds the array segment for an index (or broadcast) and projection list.
    fn array(index: Option<usize>, mut fields: Vec<String>) -> Option<Self> {
        let segment = match (index, fields.len()) {
            (Some(index), 0) => Self::ArraySpecific { index },
            (Some(index), 1) => Self::ArraySpecificSingle {
                index,
                field: fields.remove(0),
            },
            (Some(index), _) => Self::ArraySpecificMultiple { index, fields },
            (None, 0) => return None,
            (None, 1) => Self::ArrayBroadcastSingle {
                field: fields.remove(0),
            },
            (None, _) => Self::ArrayBroadcastMultiple { fields },
        };
        Some(segment)
    }
}

/// Returns `true` if `key` is a valid path key.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key) && !key.eq_ignore_ascii_case("null")
}

/// Parses a path into its bare dotted part and segment chain.
pub(crate) fn parse_path(input: &str) -> Result<(String, Vec<Segment>)> {
    let (bare, suffix) = match input.find('[') {
        Some(pos) => (&input[..pos], Some(&input[pos..])),
        None => (input, None),
    };

    if bare.is_empty() {
        return Err(QueryError::malformed(input, "path must start with a key"));
    }

    let mut segments = Vec::new();
    for key in bare.split('.') {
        segments.push(Segment::Key {
            name: validated_key(input, key)?,
        });
    }

    if let Some(suffix) = suffix {
        segments.push(parse_array_suffix(input, suffix)?);
    }

    Ok((bare.to_string(), segments))
}

fn parse_array_suffix(input: &str, suffix: &str) -> Result<Segment> {
    let caps = ARRAY_SUFFIX_RE
        .captures(suffix)
        .ok_or_else(|| QueryError::malformed(input, "expected [n], [*] or a projection like [n|a,b]"))?;

    let index = match &caps["index"] {
        "*" => None,
        digits => Some(
            digits
                .parse::<usize>()
                .map_err(|_| QueryError::malformed(input, "array index out of range"))?,
        ),
    };

    let fields = match (caps.name("fields"), caps.name("field")) {
        (Some(_), Some(_)) => {
            return Err(QueryError::malformed(
                input,
                "use either a projection list or a dotted field, not both",
            ));
        }
        (Some(list), None) => list
            .as_str()
            .split(',')
            .map(|field| validated_key(input, field))
            .collect::<Result<Vec<_>>>()?,
        (None, Some(field)) => vec![validated_key(input, field.as_str())?],
        (None, None) => Vec::new(),
    };

    Segment::array(index, fields)
        .ok_or_else(|| QueryError::malformed(input, "broadcast [*] needs at least one projected field"))
}

fn validated_key(input: &str, key: &str) -> Result<String> {
    if key.eq_ignore_ascii_case("null") {
        Err(QueryError::malformed(
            input,
            format!("'{key}' cannot be used as a key"),
        ))
    } else if is_valid_key(key) {
        Ok(key.to_string())
    } else if key.is_empty() {
        Err(QueryError::malformed(input, "empty key"))
    } else {
        Err(QueryError::malformed(
            input,
            format!("invalid key '{key}': keys may contain only letters, digits, '_' and '-'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(input: &str) -> Segment {
        let (_, segments) = parse_path(input).unwrap();
        segments.last().cloned().unwrap()
    }

    #[test]
    fn test_plain_keys() {
        let (bare, segments) = parse_path("a.b.c").unwrap();
        assert_eq!(bare, "a.b.c");
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| matches!(s, Segment::Key { .. })));
    }

    #[test]
    fn test_fixed_index() {
        let (bare, segments) = parse_path("tags[0]").unwrap();
        assert_eq!(bare, "tags");
        assert_eq!(segments[1], Segment::ArraySpecific { index: 0 });
    }

    #[test]
    fn test_fixed_index_projection_forms() {
        let expected = Segment::ArraySpecificSingle {
            index: 2,
            field: "score".to_string(),
        };
        assert_eq!(leaf("team[2|score]"), expected);
        assert_eq!(leaf("team[2].score"), expected);
        assert_eq!(
            leaf("team[2|score,name]"),
            Segment::ArraySpecificMultiple {
                index: 2,
                fields: vec!["score".to_string(), "name".to_string()],
            }
        );
    }

    #[test]
    fn test_broadcast_projection_forms() {
        let expected = Segment::ArrayBroadcastSingle {
            field: "score".to_string(),
        };
        assert_eq!(leaf("team[*|score]"), expected);
        assert_eq!(leaf("team[*].score"), expected);
        assert!(matches!(
            leaf("x.team[*|a,b,c]"),
            Segment::ArrayBroadcastMultiple { fields } if fields.len() == 3
        ));
    }

    #[test]
    fn test_projection_view() {
        let segment = leaf("team[*|a,b]");
        let projection = segment.projection().unwrap();
        assert_eq!(projection.index, None);
        assert!(projection.is_multiple());

        let segment = leaf("team[1].a");
        let projection = segment.projection().unwrap();
        assert_eq!(projection.index, Some(1));
        assert_eq!(projection.fields, ["a".to_string()]);

        assert!(leaf("team[1]").projection().is_none());
        assert!(leaf("team").projection().is_none());
    }

    #[test]
    fn test_null_like_keys_allowed_as_part_of_name() {
        assert!(parse_path("nullable.null_count").is_ok());
    }

    #[test]
    fn test_rejects_bad_paths() {
        for bad in [
            "", ".a", "a.", "a..b", "a b", "a'b", "team[*]", "team[x]", "team[0|]", "team[0|a,]",
            "team[0|a].b", "team[0].a.b", "team[0]x", "[0]", "a[0][1]", "null", "a.NULL",
            "team[*|score,Null]", "team[0].null",
        ] {
            assert!(parse_path(bad).is_err(), "expected '{bad}' to be rejected");
        }
    }
}
