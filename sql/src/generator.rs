//! Statement assembly.
//!
//! [`SqlGenerator`] maps the backend's lowering rules over each clause and
//! assembles `select`, `update` and `delete` statements once, at
//! construction. The result is immutable and can be shared freely.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use squril_core::{
    Clause, OrderTerm, Query, QueryError, RangeTerm, Result, Segment, SelectTerm, WhereTerm,
};
use tracing::{debug, warn};

use crate::backend::{Backend, Column, LowerContext};
use crate::fragment::{Param, SqlFragment};
use crate::operators::lower_literal;

static TABLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("static regex must compile")
});

/// A finished statement and the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    fn render(backend: &dyn Backend, parts: impl IntoIterator<Item = SqlFragment>) -> Self {
        let (sql, params) =
            SqlFragment::join(parts, " ").render(|index| backend.placeholder(index));
        Self { sql, params }
    }
}

/// Validates that a table name can be used unquoted.
pub fn validate_table_name(table: &str) -> Result<()> {
    if TABLE_NAME_RE.is_match(table) {
        Ok(())
    } else {
        Err(QueryError::InvalidTableName(table.to_string()))
    }
}

/// Compiled statements for one `(table, query, payload)` triple.
///
/// # Examples
///
/// ```
/// # use serde_json::Value;
/// # use squril_core::{Projection, Result, SelectTerm};
/// # use squril_sql::{Backend, Column, LowerContext, SqlFragment};
/// use squril_sql::SqlGenerator;
///
/// # struct Plain;
/// # impl Backend for Plain {
/// #     fn name(&self) -> &'static str { "plain" }
/// #     fn json_array_function(&self) -> &'static str { "array" }
/// #     fn placeholder(&self, index: usize) -> String { format!("?{index}") }
/// #     fn key_selection(&self, _: &LowerContext<'_>, term: &SelectTerm) -> Result<SqlFragment> {
/// #         Ok(SqlFragment::sql(term.original.clone()))
/// #     }
/// #     fn array_selection(&self, _: &LowerContext<'_>, term: &SelectTerm, _: usize) -> Result<SqlFragment> {
/// #         Ok(SqlFragment::sql(term.original.clone()))
/// #     }
/// #     fn array_sub_selection(&self, _: &LowerContext<'_>, term: &SelectTerm, _: Projection<'_>) -> Result<SqlFragment> {
/// #         Ok(SqlFragment::sql(term.original.clone()))
/// #     }
/// #     fn column(&self, _: &LowerContext<'_>, column: Column<'_>) -> Result<SqlFragment> {
/// #         Ok(SqlFragment::sql(column.operand().original.clone()))
/// #     }
/// #     fn update(&self, _: &LowerContext<'_>, key: &str, _: &Value) -> Result<SqlFragment> {
/// #         Ok(SqlFragment::sql(format!("set {key}")))
/// #     }
/// # }
/// let compiled = SqlGenerator::new(&Plain, "people", "where=age=gte.21&range=5.10", None).unwrap();
/// assert_eq!(
///     compiled.select().sql,
///     "select * from people where age >= 21 limit 10 offset 5"
/// );
/// assert_eq!(compiled.delete().sql, "delete from people where age >= 21");
/// assert!(compiled.update().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    table: String,
    query: Query,
    select: Statement,
    update: Option<Statement>,
    delete: Statement,
}

impl SqlGenerator {
    /// Parses `uri_query` and compiles it for `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MalformedQuery`] if the query string does not
    /// parse, [`QueryError::InvalidTableName`] for an unusable table name, and
    /// [`QueryError::InvalidUpdate`] if `payload` does not match the `set`
    /// clause.
    pub fn new(
        backend: &dyn Backend,
        table: &str,
        uri_query: &str,
        payload: Option<&Value>,
    ) -> Result<Self> {
        Self::from_query(backend, table, Query::parse(uri_query)?, payload)
    }

    /// Compiles an already parsed query.
    pub fn from_query(
        backend: &dyn Backend,
        table: &str,
        query: Query,
        payload: Option<&Value>,
    ) -> Result<Self> {
        validate_table_name(table)?;

        let lowering = Lowering {
            backend,
            ctx: LowerContext { table },
        };
        let select = lowering.select_statement(&query)?;
        let update = lowering.update_statement(&query, payload)?;
        let delete = lowering.delete_statement(&query)?;

        debug!(
            backend = backend.name(),
            table,
            select = %select.sql,
            update = update.as_ref().map(|s| s.sql.as_str()),
            "Compiled query"
        );

        Ok(Self {
            table: table.to_string(),
            query,
            select,
            update,
            delete,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn select(&self) -> &Statement {
        &self.select
    }

    /// Present only when the query has a `set` clause and a payload was given.
    pub fn update(&self) -> Option<&Statement> {
        self.update.as_ref()
    }

    pub fn delete(&self) -> &Statement {
        &self.delete
    }
}

struct Lowering<'a> {
    backend: &'a dyn Backend,
    ctx: LowerContext<'a>,
}

impl Lowering<'_> {
    fn map_clause<T>(
        &self,
        clause: Option<&Clause<T>>,
        lower: impl Fn(&Self, &T) -> Result<SqlFragment>,
    ) -> Result<Vec<SqlFragment>> {
        clause
            .into_iter()
            .flatten()
            .map(|term| lower(self, term))
            .collect()
    }

    /// Dispatches on the terminal segment only.
    fn select_term(&self, term: &SelectTerm) -> Result<SqlFragment> {
        match term.leaf() {
            Segment::Key { .. } => self.backend.key_selection(&self.ctx, term),
            Segment::ArraySpecific { index } => {
                self.backend.array_selection(&self.ctx, term, *index)
            }
            leaf => {
                let projection = leaf.projection().ok_or_else(|| {
                    QueryError::UnsupportedTerm(format!("cannot select '{}'", term.original))
                })?;
                self.backend
                    .array_sub_selection(&self.ctx, term, projection)
            }
        }
    }

    fn where_term(&self, term: &WhereTerm) -> Result<SqlFragment> {
        let column = self.backend.column(&self.ctx, Column::Filter(term))?;
        Ok(SqlFragment::join(
            [
                SqlFragment::sql(term.combinator.map_or("", |c| c.as_sql())),
                SqlFragment::sql("(".repeat(term.groups_open)),
                column,
                SqlFragment::sql(self.backend.operator_sql(term.operator)),
                lower_literal(term),
                SqlFragment::sql(")".repeat(term.groups_close)),
            ],
            " ",
        ))
    }

    fn order_term(&self, term: &OrderTerm) -> Result<SqlFragment> {
        let mut fragment = SqlFragment::sql("order by ");
        fragment
            .append(self.backend.column(&self.ctx, Column::Order(term))?)
            .push_sql(format!(" {}", term.direction.as_sql()));
        Ok(fragment)
    }

    fn range_term(&self, term: &RangeTerm) -> Result<SqlFragment> {
        Ok(SqlFragment::sql(format!(
            "limit {} offset {}",
            term.count, term.start
        )))
    }

    fn set_term(&self, term: &SelectTerm, payload: &Value) -> Result<SqlFragment> {
        if !term.is_top_level_key() {
            return Err(QueryError::UnsupportedTerm(format!(
                "cannot update '{}'",
                term.original
            )));
        }
        let key = term.bare_path.as_str();
        let object = payload
            .as_object()
            .ok_or_else(|| QueryError::InvalidUpdate("payload must be a JSON object".to_string()))?;
        let value = object.get(key).filter(|value| !value.is_null()).ok_or_else(|| {
            QueryError::InvalidUpdate(format!("target key of update: {key} not found in payload"))
        })?;
        if object.len() != 1 {
            return Err(QueryError::InvalidUpdate(
                "cannot update more than one key per statement".to_string(),
            ));
        }
        self.backend.update(&self.ctx, key, value)
    }

    fn select_clause(&self, query: &Query) -> Result<SqlFragment> {
        let terms = self.map_clause(query.select.as_ref(), Self::select_term)?;
        let table = self.ctx.table;
        if terms.is_empty() {
            return Ok(SqlFragment::sql(format!("select * from {table}")));
        }
        let mut fragment = SqlFragment::sql(format!(
            "select {}(",
            self.backend.json_array_function()
        ));
        fragment
            .append(SqlFragment::join(terms, ", "))
            .push_sql(format!(") from {table}"));
        Ok(fragment)
    }

    fn where_clause(&self, query: &Query) -> Result<SqlFragment> {
        let predicates = self.map_clause(query.filter.as_ref(), Self::where_term)?;
        if predicates.is_empty() {
            return Ok(SqlFragment::new());
        }
        let mut fragment = SqlFragment::sql("where ");
        fragment.append(SqlFragment::join(predicates, " "));
        Ok(fragment)
    }

    fn order_clause(&self, query: &Query) -> Result<SqlFragment> {
        Ok(self
            .map_clause(query.order.as_ref(), Self::order_term)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    fn range_clause(&self, query: &Query) -> Result<SqlFragment> {
        Ok(self
            .map_clause(query.range.as_ref(), Self::range_term)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    fn select_statement(&self, query: &Query) -> Result<Statement> {
        Ok(Statement::render(
            self.backend,
            [
                self.select_clause(query)?,
                self.where_clause(query)?,
                self.order_clause(query)?,
                self.range_clause(query)?,
            ],
        ))
    }

    fn update_statement(&self, query: &Query, payload: Option<&Value>) -> Result<Option<Statement>> {
        let (Some(set), Some(payload)) = (query.set.as_ref(), payload) else {
            return Ok(None);
        };
        let set = self.set_term(set.first(), payload).inspect_err(|err| {
            warn!(table = self.ctx.table, error = %err, "Rejected update payload");
        })?;
        Ok(Some(Statement::render(
            self.backend,
            [
                SqlFragment::sql(format!("update {}", self.ctx.table)),
                set,
                self.where_clause(query)?,
            ],
        )))
    }

    fn delete_statement(&self, query: &Query) -> Result<Statement> {
        Ok(Statement::render(
            self.backend,
            [
                SqlFragment::sql(format!("delete from {}", self.ctx.table)),
                self.where_clause(query)?,
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use squril_core::Projection;

    /// Renders every rule as a readable tag so assembly can be checked
    /// independently of any real dialect.
    struct Tagging;

    impl Backend for Tagging {
        fn name(&self) -> &'static str {
            "tagging"
        }

        fn json_array_function(&self) -> &'static str {
            "arr"
        }

        fn placeholder(&self, index: usize) -> String {
            format!("${index}")
        }

        fn key_selection(&self, _: &LowerContext<'_>, term: &SelectTerm) -> Result<SqlFragment> {
            Ok(SqlFragment::sql(format!("key({})", term.original)))
        }

        fn array_selection(
            &self,
            _: &LowerContext<'_>,
            term: &SelectTerm,
            index: usize,
        ) -> Result<SqlFragment> {
            Ok(SqlFragment::sql(format!("idx({},{index})", term.bare_path)))
        }

        fn array_sub_selection(
            &self,
            _: &LowerContext<'_>,
            term: &SelectTerm,
            projection: Projection<'_>,
        ) -> Result<SqlFragment> {
            let index = projection.index.map_or("*".to_string(), |i| i.to_string());
            Ok(SqlFragment::sql(format!(
                "sub({},{index},{})",
                term.bare_path,
                projection.fields.join("+")
            )))
        }

        fn column(&self, _: &LowerContext<'_>, column: Column<'_>) -> Result<SqlFragment> {
            let kind = match column {
                Column::Filter(_) => "w",
                Column::Order(_) => "o",
            };
            Ok(SqlFragment::sql(format!("{kind}:{}", column.operand().original)))
        }

        fn update(&self, _: &LowerContext<'_>, key: &str, value: &Value) -> Result<SqlFragment> {
            let mut fragment = SqlFragment::sql(format!("set {key} = "));
            fragment.push_param(Param::Json(value.clone()));
            Ok(fragment)
        }
    }

    fn compile(query: &str, payload: Option<Value>) -> Result<SqlGenerator> {
        SqlGenerator::new(&Tagging, "people", query, payload.as_ref())
    }

    #[test]
    fn test_select_star_without_select_clause() {
        let compiled = compile("", None).unwrap();
        assert_eq!(compiled.select().sql, "select * from people");
        assert_eq!(compiled.delete().sql, "delete from people");
        assert!(compiled.update().is_none());
    }

    #[test]
    fn test_leaf_dispatch() {
        let compiled = compile("select=a.b,tags[2],team[1|x],team[*|x,y]", None).unwrap();
        assert_eq!(
            compiled.select().sql,
            "select arr(key(a.b), idx(tags,2), sub(team,1,x), sub(team,*,x+y)) from people"
        );
    }

    #[test]
    fn test_end_to_end_ordering() {
        let compiled = compile(
            "select=name,tags[0]&where=age=gte.21&order=age.desc&range=0.20",
            None,
        )
        .unwrap();
        assert_eq!(
            compiled.select().sql,
            "select arr(key(name), idx(tags,0)) from people where w:age >= 21 order by o:age desc limit 20 offset 0"
        );
        assert!(compiled.select().params.is_empty());
    }

    #[test]
    fn test_range_is_offset_and_count() {
        let compiled = compile("range=5.10", None).unwrap();
        assert_eq!(compiled.select().sql, "select * from people limit 10 offset 5");
    }

    #[test]
    fn test_where_groups_render_as_written() {
        let compiled = compile("where=((a=eq.1,or:b=eq.x),and:c=is.not.null)", None).unwrap();
        assert_eq!(
            compiled.delete().sql,
            "delete from people where (( w:a = 1 or w:b = $1 ) and w:c is not null )"
        );
        assert_eq!(compiled.delete().params, vec![Param::Text("x".to_string())]);
    }

    #[test]
    fn test_combinator_precedes_group_open() {
        let compiled = compile("where=a=eq.1,and:(b=eq.2,or:c=eq.3)", None).unwrap();
        assert_eq!(
            compiled.delete().sql,
            "delete from people where w:a = 1 and ( w:b = 2 or w:c = 3 )"
        );
    }

    #[test]
    fn test_update_numbers_set_before_where() {
        let compiled = compile(
            "set=name&where=name=eq.old,or:name=in.[a,b]",
            Some(json!({"name": "new"})),
        )
        .unwrap();
        let update = compiled.update().unwrap();
        assert_eq!(
            update.sql,
            "update people set name = $1 where w:name = $2 or w:name in ($3,$4)"
        );
        assert_eq!(update.params.len(), 4);
        assert_eq!(update.params[0], Param::Json(json!("new")));

        // The select statement numbers its own placeholders from 1.
        assert!(compiled.select().sql.contains("w:name = $1"));
    }

    #[test]
    fn test_update_requires_set_and_payload() {
        assert!(compile("set=name", None).unwrap().update().is_none());
        assert!(compile("", Some(json!({"name": 1}))).unwrap().update().is_none());
    }

    #[test]
    fn test_update_rejects_bad_payloads() {
        for payload in [
            json!({}),
            json!({"other": 1}),
            json!({"name": 1, "other": 2}),
            json!({"name": null}),
            json!([1, 2]),
            json!("name"),
        ] {
            match compile("set=name", Some(payload.clone())) {
                Err(QueryError::InvalidUpdate(_)) => {}
                other => panic!("expected InvalidUpdate for {payload}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_table_names() {
        for table in [
            "", "people; drop", "a.b.c", "pe ople", "\"x\"", "123", "1.people", "app.2x",
        ] {
            assert!(matches!(
                SqlGenerator::new(&Tagging, table, "", None),
                Err(QueryError::InvalidTableName(_))
            ));
        }
        for table in ["app.people", "_people", "people_2", "app_1._x"] {
            assert!(SqlGenerator::new(&Tagging, table, "", None).is_ok(), "{table}");
        }
    }

    #[test]
    fn test_malformed_query_propagates() {
        assert!(matches!(
            compile("select=a b", None),
            Err(QueryError::MalformedQuery { .. })
        ));
    }

    #[test]
    fn test_compiled_generator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqlGenerator>();
    }
}
