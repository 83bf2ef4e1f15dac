//! One-time schema setup for PostgreSQL tables.
//!
//! These statements are opaque to the generator: a migration runner executes
//! them once before any compiled statement that projects array elements.

/// Projects `keys` out of every element of the jsonb array `data`.
///
/// Returns one entry per element, in element order. A single key yields the
/// bare value, several keys yield an array of values. Missing fields become
/// JSON `null` so the output always has the input's cardinality.
pub const FILTER_ARRAY_ELEMENTS: &str = "\
create or replace function filter_array_elements(data jsonb, keys text[])
    returns jsonb as $$
    select coalesce(jsonb_agg(projection.value order by element.ord), '[]'::jsonb)
    from jsonb_array_elements(data) with ordinality as element(value, ord)
    cross join lateral (
        select case
            when cardinality(keys) = 1 then element.value -> keys[1]
            else (
                select jsonb_agg(element.value -> field.name order by field.ord)
                from unnest(keys) with ordinality as field(name, ord)
            )
        end as value
    ) as projection
$$ language sql immutable;";

/// Trigger routine storing an md5 digest of each row's document in `uniq`.
pub const UNIQUE_DATA: &str = "\
create or replace function unique_data()
    returns trigger as $$
    begin
        NEW.uniq := md5(NEW.data::text);
        return NEW;
    end;
$$ language plpgsql;";

/// Initialization statements in execution order.
pub const INIT_SQL: &[&str] = &[FILTER_ARRAY_ELEMENTS, UNIQUE_DATA];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_order() {
        assert_eq!(INIT_SQL.len(), 2);
        assert!(INIT_SQL[0].contains("function filter_array_elements(data jsonb, keys text[])"));
        assert!(INIT_SQL[1].contains("function unique_data()"));
    }

    #[test]
    fn test_statements_are_complete() {
        for statement in INIT_SQL {
            assert!(statement.starts_with("create or replace function"));
            assert!(statement.ends_with(';'));
            assert_eq!(statement.matches("$$").count(), 2, "{statement}");
        }
    }

    #[test]
    fn test_helper_body() {
        let expected = [
            "create or replace function filter_array_elements(data jsonb, keys text[])",
            "    returns jsonb as $$",
            // One aggregate row per element, in element order; an empty array
            // aggregates to SQL null, which becomes `[]`.
            "    select coalesce(jsonb_agg(projection.value order by element.ord), '[]'::jsonb)",
            "    from jsonb_array_elements(data) with ordinality as element(value, ord)",
            // Lateral join yields exactly one projection per element.
            "    cross join lateral (",
            "        select case",
            // Single key: the bare value. `->` on a missing key or on a
            // non-object element is SQL null, aggregated as JSON null.
            "            when cardinality(keys) = 1 then element.value -> keys[1]",
            // Several keys: an array with one entry per key, in key order,
            // JSON null for each missing key.
            "            else (",
            "                select jsonb_agg(element.value -> field.name order by field.ord)",
            "                from unnest(keys) with ordinality as field(name, ord)",
            "            )",
            "        end as value",
            "    ) as projection",
            "$$ language sql immutable;",
        ]
        .join("\n");
        assert_eq!(FILTER_ARRAY_ELEMENTS, expected);
    }

    #[test]
    fn test_helper_keeps_element_order() {
        assert!(FILTER_ARRAY_ELEMENTS.contains("with ordinality as element(value, ord)"));
        assert!(FILTER_ARRAY_ELEMENTS.contains("order by element.ord"));
        assert!(FILTER_ARRAY_ELEMENTS.contains("'[]'::jsonb"));
    }
}
