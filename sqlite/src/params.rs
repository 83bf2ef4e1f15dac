//! Binding compiled statements with rusqlite.

use rusqlite::types::Value;
use rusqlite::{ParamsFromIter, params_from_iter};
use squril_sql::{Param, Statement};

/// Converts bound parameters to rusqlite values.
///
/// Every parameter binds as text; JSON payloads bind as their serialized
/// form, which SQLite's JSON functions parse on use.
pub fn to_sql_values(params: &[Param]) -> Vec<Value> {
    params
        .iter()
        .map(|param| Value::Text(param.to_sql_text()))
        .collect()
}

/// Parameters for executing `statement` with rusqlite.
///
/// # Examples
///
/// ```
/// use rusqlite::Connection;
/// use squril_sqlite::{bind, compile};
///
/// let conn = Connection::open_in_memory().unwrap();
/// conn.execute_batch("create table people (data text)").unwrap();
/// conn.execute("insert into people (data) values ('{\"name\": \"ada\"}')", []).unwrap();
///
/// let compiled = compile("people", "select=name&where=name=eq.ada", None).unwrap();
/// let select = compiled.select();
/// let row: String = conn
///     .query_row(&select.sql, bind(select), |row| row.get(0))
///     .unwrap();
/// assert_eq!(row, r#"["ada"]"#);
/// ```
pub fn bind(statement: &Statement) -> ParamsFromIter<Vec<Value>> {
    params_from_iter(to_sql_values(&statement.params))
}
