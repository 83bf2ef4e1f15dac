//! Fixed operator table and literal rendering.

use squril_core::{Literal, Operator, WhereTerm};

use crate::fragment::{Param, SqlFragment};

/// Default SQL spelling of each operator.
///
/// Compound tokens render with their `.` separator replaced by a space.
pub fn operator_sql(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Neq => "!=",
        Operator::Like => "like",
        Operator::ILike => "ilike",
        Operator::Not => "not",
        Operator::Is => "is",
        Operator::In => "in",
        Operator::IsNot => "is not",
        Operator::NotLike => "not like",
        Operator::NotILike => "not ilike",
        Operator::NotIn => "not in",
    }
}

/// Lowers the literal operand of a predicate.
///
/// Integers and the `null` sentinel render inline (the integer from its
/// validated digits, so magnitude is never limited). Everything else is bound; list elements are bound
/// one by one as text.
pub fn lower_literal(term: &WhereTerm) -> SqlFragment {
    match term.literal_value() {
        Literal::Integer(digits) => SqlFragment::sql(digits),
        Literal::Null => SqlFragment::sql("null"),
        Literal::List(items) => {
            let mut fragment = SqlFragment::sql("(");
            for (i, item) in items.into_iter().enumerate() {
                if i > 0 {
                    fragment.push_sql(",");
                }
                fragment.push_param(Param::Text(item.to_string()));
            }
            fragment.push_sql(")");
            fragment
        }
        Literal::Text(text) if term.operator.is_pattern() => {
            SqlFragment::param(Param::Text(text.replace('*', "%")))
        }
        Literal::Text(text) => SqlFragment::param(Param::Text(text.into_owned())),
    }
}
