//! Lowering rules for PostgreSQL `jsonb` operators.
//!
//! Paths become text-array literals for `#>`/`#>>` (`data #> '{a,b}'`).
//! Array projections call the `filter_array_elements` helper declared in
//! [`INIT_SQL`](crate::INIT_SQL).

use serde_json::Value;
use squril_core::{Projection, Result, Segment, SelectTerm};
use squril_sql::{Backend, Column, DATA_COLUMN, LowerContext, Param, SqlFragment};

use crate::init::INIT_SQL;

/// PostgreSQL dialect.
///
/// # Examples
///
/// ```
/// use squril_postgres::PostgresBackend;
/// use squril_sql::SqlGenerator;
///
/// let compiled =
///     SqlGenerator::new(&PostgresBackend, "people", "select=address.city&where=name=eq.ada", None)
///         .unwrap();
/// assert_eq!(
///     compiled.select().sql,
///     "select jsonb_build_array(data #> '{address,city}') from people where data #>> '{name}' = $1"
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBackend;

/// Renders path elements as a text-array literal.
fn path_array<'a>(elements: impl IntoIterator<Item = &'a str>) -> String {
    let elements: Vec<&str> = elements.into_iter().collect();
    format!("'{{{}}}'", elements.join(","))
}

fn at_path(term: &SelectTerm) -> String {
    format!("{DATA_COLUMN} #> {}", path_array(term.keys()))
}

impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn json_array_function(&self) -> &'static str {
        "jsonb_build_array"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn init_sql(&self) -> &'static [&'static str] {
        INIT_SQL
    }

    fn key_selection(&self, _ctx: &LowerContext<'_>, term: &SelectTerm) -> Result<SqlFragment> {
        Ok(SqlFragment::sql(at_path(term)))
    }

    fn array_selection(
        &self,
        _ctx: &LowerContext<'_>,
        term: &SelectTerm,
        index: usize,
    ) -> Result<SqlFragment> {
        Ok(SqlFragment::sql(format!("{} -> {index}", at_path(term))))
    }

    fn array_sub_selection(
        &self,
        _ctx: &LowerContext<'_>,
        term: &SelectTerm,
        projection: Projection<'_>,
    ) -> Result<SqlFragment> {
        let array = at_path(term);
        let fields = path_array(projection.fields.iter().map(String::as_str));
        let mut projected = format!("filter_array_elements({array}, {fields})");
        if let Some(index) = projection.index {
            projected.push_str(&format!(" -> {index}"));
        }
        Ok(SqlFragment::sql(format!(
            "case when jsonb_typeof({array}) = 'array' then {projected} else null end"
        )))
    }

    /// Filters extract text (`#>>`), cast to `bigint` when compared against an
    /// integer (`numeric` past the `bigint` range). Ordering keeps `jsonb`
    /// (`#>`).
    fn column(&self, _ctx: &LowerContext<'_>, column: Column<'_>) -> Result<SqlFragment> {
        let operand = column.operand();
        let index;
        let mut elements: Vec<&str> = operand.keys().collect();
        match operand.leaf() {
            Segment::ArraySpecific { index: i } => {
                index = i.to_string();
                elements.push(&index);
            }
            Segment::ArraySpecificSingle { index: i, field } => {
                index = i.to_string();
                elements.push(&index);
                elements.push(field);
            }
            _ => {}
        }
        let path = path_array(elements);

        let sql = match column {
            Column::Filter(term) => {
                let text = format!("{DATA_COLUMN} #>> {path}");
                match term.integer_literal() {
                    Some(digits) if term.operator.is_magnitude() => {
                        let cast = if digits.parse::<i64>().is_ok() {
                            "bigint"
                        } else {
                            "numeric"
                        };
                        format!("({text})::{cast}")
                    }
                    _ => text,
                }
            }
            Column::Order(_) => format!("{DATA_COLUMN} #> {path}"),
        };
        Ok(SqlFragment::sql(sql))
    }

    fn update(&self, _ctx: &LowerContext<'_>, key: &str, value: &Value) -> Result<SqlFragment> {
        let mut fragment = SqlFragment::sql(format!(
            "set {DATA_COLUMN} = jsonb_set({DATA_COLUMN}, {}, ",
            path_array([key])
        ));
        fragment
            .push_param(Param::Json(value.clone()))
            .push_sql("::jsonb)");
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use squril_sql::SqlGenerator;

    fn compile(query: &str) -> SqlGenerator {
        SqlGenerator::new(&PostgresBackend, "people", query, None).unwrap()
    }

    fn select_sql(query: &str) -> String {
        compile(query).select().sql.clone()
    }

    fn delete_sql(query: &str) -> String {
        compile(query).delete().sql.clone()
    }

    #[test]
    fn test_key_selection() {
        assert_eq!(
            select_sql("select=name,a.b.c"),
            "select jsonb_build_array(data #> '{name}', data #> '{a,b,c}') from people"
        );
    }

    #[test]
    fn test_array_selection() {
        assert_eq!(
            select_sql("select=x.tags[3]"),
            "select jsonb_build_array(data #> '{x,tags}' -> 3) from people"
        );
    }

    #[test]
    fn test_broadcast_sub_selection() {
        assert_eq!(
            select_sql("select=team[*|name,score]"),
            "select jsonb_build_array(case when jsonb_typeof(data #> '{team}') = 'array' \
             then filter_array_elements(data #> '{team}', '{name,score}') else null end) from people"
        );
    }

    #[test]
    fn test_fixed_index_sub_selection_indexes_projection() {
        let single = select_sql("select=team[1].score");
        assert!(
            single.contains("filter_array_elements(data #> '{team}', '{score}') -> 1 else null end"),
            "{single}"
        );
        let multiple = select_sql("select=team[1|score,name]");
        assert!(
            multiple.contains("filter_array_elements(data #> '{team}', '{score,name}') -> 1"),
            "{multiple}"
        );
    }

    #[test]
    fn test_filter_columns_use_single_path() {
        assert_eq!(
            delete_sql("where=tags[0]=eq.x,and:team[2|score]=like.a*,or:team[*|score]=is.null"),
            "delete from people where data #>> '{tags,0}' = $1 \
             and data #>> '{team,2,score}' like $2 \
             or data #>> '{team}' is null"
        );
    }

    #[test]
    fn test_integer_comparisons_cast() {
        assert_eq!(
            delete_sql("where=age=gte.21,and:code=eq.'21',and:n=in.[1,2]"),
            "delete from people where (data #>> '{age}')::bigint >= 21 \
             and data #>> '{code}' = $1 \
             and data #>> '{n}' in ($2,$3)"
        );
    }

    #[test]
    fn test_wide_integer_comparisons_cast_to_numeric() {
        assert_eq!(
            delete_sql("where=id=gt.9223372036854775808,or:id=lte.-9223372036854775808"),
            "delete from people where (data #>> '{id}')::numeric > 9223372036854775808 \
             or (data #>> '{id}')::bigint <= -9223372036854775808"
        );
        assert!(compile("where=id=gt.9223372036854775808").delete().params.is_empty());
    }

    #[test]
    fn test_order_keeps_jsonb() {
        assert_eq!(
            select_sql("order=a.b.desc"),
            "select * from people order by data #> '{a,b}' desc"
        );
        assert_eq!(
            select_sql("order=team[0].score.asc"),
            "select * from people order by data #> '{team,0,score}' asc"
        );
    }

    #[test]
    fn test_ilike_is_native() {
        assert_eq!(
            delete_sql("where=name=not.ilike.*x"),
            "delete from people where data #>> '{name}' not ilike $1"
        );
    }

    #[test]
    fn test_update_uses_jsonb_set() {
        let payload = json!({"tags": ["a", "b"]});
        let compiled =
            SqlGenerator::new(&PostgresBackend, "people", "set=tags&where=id=eq.7", Some(&payload))
                .unwrap();
        let update = compiled.update().unwrap();
        assert_eq!(
            update.sql,
            "update people set data = jsonb_set(data, '{tags}', $1::jsonb) where (data #>> '{id}')::bigint = 7"
        );
        assert_eq!(update.params, vec![Param::Json(json!(["a", "b"]))]);
    }

    #[test]
    fn test_declares_init_sql() {
        assert_eq!(PostgresBackend.init_sql(), INIT_SQL);
    }
}
