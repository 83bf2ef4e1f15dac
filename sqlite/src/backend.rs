//! Lowering rules for SQLite's built-in JSON functions.
//!
//! Plain keys and fixed indices map straight onto `json_extract` paths since
//! SQLite path syntax already understands `a.b[0]`. Projections out of array
//! elements cannot be written as a single path, so they become a correlated
//! `json_each` walk over the row's array. Elements that are not objects
//! project `null` for every field.

use serde_json::{Map, Value};
use squril_core::{Operator, Projection, Result, Segment, SelectTerm};
use squril_sql::{Backend, Column, DATA_COLUMN, LowerContext, Param, SqlFragment, operator_sql};

/// SQLite dialect.
///
/// # Examples
///
/// ```
/// use squril_sqlite::SqliteBackend;
/// use squril_sql::SqlGenerator;
///
/// let compiled = SqlGenerator::new(&SqliteBackend, "people", "select=name&where=age=gt.30", None)
///     .unwrap();
/// assert_eq!(
///     compiled.select().sql,
///     "select json_array(json_extract(data, '$.name')) from people where json_extract(data, '$.age') > 30"
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

fn extract(path: &str) -> String {
    format!("json_extract({DATA_COLUMN}, '$.{path}')")
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn json_array_function(&self) -> &'static str {
        "json_array"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    /// `LIKE` is already case-insensitive for ASCII and there is no `ILIKE`.
    fn operator_sql(&self, operator: Operator) -> &'static str {
        match operator {
            Operator::ILike => "like",
            Operator::NotILike => "not like",
            other => operator_sql(other),
        }
    }

    fn key_selection(&self, _ctx: &LowerContext<'_>, term: &SelectTerm) -> Result<SqlFragment> {
        Ok(SqlFragment::sql(extract(&term.original)))
    }

    fn array_selection(
        &self,
        _ctx: &LowerContext<'_>,
        term: &SelectTerm,
        index: usize,
    ) -> Result<SqlFragment> {
        Ok(SqlFragment::sql(extract(&format!(
            "{}[{index}]",
            term.bare_path
        ))))
    }

    fn array_sub_selection(
        &self,
        ctx: &LowerContext<'_>,
        term: &SelectTerm,
        projection: Projection<'_>,
    ) -> Result<SqlFragment> {
        let root = format!("$.{}", term.bare_path);
        let fields: Vec<String> = projection
            .fields
            .iter()
            .map(|field| {
                format!("json_extract(case when type = 'object' then value end, '$.{field}')")
            })
            .collect();
        let projected = if projection.is_multiple() {
            format!("json_array({})", fields.join(", "))
        } else {
            fields.join("")
        };
        let walk = format!("json_each({}.{DATA_COLUMN}, '{root}')", ctx.table);

        // Subquery results lose their JSON subtype, so every branch yields
        // JSON text and the outer json() restores it.
        let subquery = match projection.index {
            Some(index) => {
                let value = if projection.is_multiple() {
                    projected
                } else {
                    format!("json_quote({projected})")
                };
                format!("select {value} from {walk} where fullkey = '{root}[{index}]'")
            }
            None => format!("select json_group_array({projected}) from {walk}"),
        };

        Ok(SqlFragment::sql(format!(
            "json(case when json_type({DATA_COLUMN}, '{root}') = 'array' then ({subquery}) else null end)"
        )))
    }

    fn column(&self, _ctx: &LowerContext<'_>, column: Column<'_>) -> Result<SqlFragment> {
        let operand = column.operand();
        let target = match operand.leaf() {
            Segment::ArraySpecific { index } => format!("{}[{index}]", operand.bare_path),
            Segment::ArraySpecificSingle { index, field } => {
                format!("{}[{index}].{field}", operand.bare_path)
            }
            _ => operand.bare_path.clone(),
        };
        Ok(SqlFragment::sql(extract(&target)))
    }

    fn update(&self, _ctx: &LowerContext<'_>, key: &str, value: &Value) -> Result<SqlFragment> {
        let mut patch = Map::new();
        patch.insert(key.to_string(), value.clone());

        let mut fragment =
            SqlFragment::sql(format!("set {DATA_COLUMN} = json_patch({DATA_COLUMN}, "));
        fragment
            .push_param(Param::Json(Value::Object(patch)))
            .push_sql(")");
        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use squril_sql::SqlGenerator;

    fn select_sql(query: &str) -> String {
        SqlGenerator::new(&SqliteBackend, "people", query, None)
            .unwrap()
            .select()
            .sql
            .clone()
    }

    #[test]
    fn test_key_selection_uses_original_path() {
        assert_eq!(
            select_sql("select=a.b.c"),
            "select json_array(json_extract(data, '$.a.b.c')) from people"
        );
    }

    #[test]
    fn test_array_selection() {
        assert_eq!(
            select_sql("select=tags[3]"),
            "select json_array(json_extract(data, '$.tags[3]')) from people"
        );
    }

    #[test]
    fn test_fixed_index_sub_selection() {
        let sql = select_sql("select=team[1|score]");
        assert!(sql.contains("json_type(data, '$.team') = 'array'"), "{sql}");
        assert!(sql.contains("json_each(people.data, '$.team')"), "{sql}");
        assert!(sql.contains("where fullkey = '$.team[1]'"), "{sql}");
        assert!(
            sql.contains("json_quote(json_extract(case when type = 'object' then value end, '$.score'))"),
            "{sql}"
        );
        assert!(!sql.contains("json_group_array"), "{sql}");
    }

    #[test]
    fn test_broadcast_multiple_sub_selection() {
        let sql = select_sql("select=team[*|name,score]");
        assert!(
            sql.contains(
                "json_group_array(json_array(\
                 json_extract(case when type = 'object' then value end, '$.name'), \
                 json_extract(case when type = 'object' then value end, '$.score')))"
            ),
            "{sql}"
        );
        assert!(!sql.contains("fullkey"), "{sql}");
    }

    #[test]
    fn test_column_references() {
        let compiled = SqlGenerator::new(
            &SqliteBackend,
            "people",
            "where=a.b=eq.1,and:tags[0]=eq.2,and:team[2|score]=gt.3,and:team[*|score]=eq.4",
            None,
        )
        .unwrap();
        assert_eq!(
            compiled.delete().sql,
            "delete from people where json_extract(data, '$.a.b') = 1 \
             and json_extract(data, '$.tags[0]') = 2 \
             and json_extract(data, '$.team[2].score') > 3 \
             and json_extract(data, '$.team') = 4"
        );
    }

    #[test]
    fn test_ilike_renders_as_like() {
        let compiled =
            SqlGenerator::new(&SqliteBackend, "people", "where=name=ilike.*al*,or:name=not.ilike.b*", None)
                .unwrap();
        assert_eq!(
            compiled.delete().sql,
            "delete from people where json_extract(data, '$.name') like ?1 or json_extract(data, '$.name') not like ?2"
        );
    }

    #[test]
    fn test_update_patches_single_key() {
        let payload = json!({"age": 42});
        let compiled =
            SqlGenerator::new(&SqliteBackend, "people", "set=age&where=name=eq.al", Some(&payload))
                .unwrap();
        let update = compiled.update().unwrap();
        assert_eq!(
            update.sql,
            "update people set data = json_patch(data, ?1) where json_extract(data, '$.name') = ?2"
        );
        assert_eq!(update.params[0], Param::Json(json!({"age": 42})));
        assert_eq!(update.params[1], Param::Text("al".to_string()));
    }
}
