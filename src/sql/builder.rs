//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::config::{ResolvedEntity, SortOrder, PK_COLUMN};
use serde_json::Value;
use std::collections::HashMap;

/// Hard cap on rows returned by one list query.
pub const MAX_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// What a list query selects: equality filters and free-text search, then ordering and a page window.
#[derive(Clone, Debug, Default)]
pub struct ListSpec {
    /// (column name, value); `null` matches `IS NULL`.
    pub filters: Vec<(String, Value)>,
    pub search: Option<String>,
    pub sort: Vec<(String, SortOrder)>,
    pub limit: u32,
    pub offset: u32,
}

/// SELECT list: every non-sensitive column; numeric as float8 so rows decode to JSON numbers.
pub fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .filter(|c| !c.sensitive)
        .map(|c| {
            let q = quoted(&c.name);
            if c.is_numeric() {
                format!("{}::float8 AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape LIKE metacharacters so a search term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, spec: &ListSpec) -> String {
    let mut parts = Vec::new();
    for (col, val) in &spec.filters {
        let Some(c) = entity.column(col) else { continue };
        if val.is_null() {
            parts.push(format!("{} IS NULL", quoted(col)));
            continue;
        }
        let n = q.push_param(val.clone());
        parts.push(format!("{} = {}", quoted(col), c.placeholder(n)));
    }
    if let Some(term) = spec.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if !entity.search_columns.is_empty() {
            let n = q.push_param(Value::String(format!("%{}%", escape_like(term))));
            let ors: Vec<String> = entity
                .search_columns
                .iter()
                .map(|c| format!("{} ILIKE ${}", quoted(c), n))
                .collect();
            parts.push(format!("({})", ors.join(" OR ")));
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(entity: &ResolvedEntity, sort: &[(String, SortOrder)]) -> String {
    let mut parts: Vec<String> = sort
        .iter()
        .filter(|(col, _)| entity.column(col).is_some())
        .map(|(col, order)| format!("{} {}", quoted(col), order.as_sql()))
        .collect();
    // Tie-break on pk so pages are stable.
    parts.push(format!("{} ASC", quoted(PK_COLUMN)));
    format!(" ORDER BY {}", parts.join(", "))
}

/// SELECT by primary key. Caller binds the id as `$1`.
pub fn select_by_id(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1::uuid",
        select_column_list(entity),
        qualified_table(entity),
        quoted(PK_COLUMN)
    );
    q
}

/// SELECT list with filters, search, ORDER BY, LIMIT/OFFSET.
pub fn select_list(entity: &ResolvedEntity, spec: &ListSpec) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, spec);
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(entity),
        qualified_table(entity),
        where_sql,
        order_clause(entity, &spec.sort),
        spec.limit.min(MAX_LIMIT),
        spec.offset
    );
    q
}

/// COUNT(*) with the same WHERE as `select_list`.
pub fn count(entity: &ResolvedEntity, spec: &ListSpec) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, spec);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(entity), where_sql);
    q
}

/// Every row in default order (data export).
pub fn select_all(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {}{}",
        select_column_list(entity),
        qualified_table(entity),
        order_clause(entity, &entity.default_sort)
    );
    q
}

/// INSERT the columns present in body (column names). Columns with a DB default are left to the DB when absent.
pub fn insert(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = body.get(&c.name) else { continue };
        let n = q.push_param(val.clone());
        cols.push(quoted(&c.name));
        placeholders.push(c.placeholder(n));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body, always bump updated_at.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    // Iterate in column order so the SQL text is deterministic.
    for c in &entity.columns {
        if c.name == PK_COLUMN || c.name == "updated_at" {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), c.placeholder(n)));
    }
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::uuid RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quoted(PK_COLUMN),
        id_param,
        select_column_list(entity)
    );
    q
}

/// DELETE by id. Caller binds the id as `$1`.
pub fn delete(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1::uuid RETURNING {}",
        qualified_table(entity),
        quoted(PK_COLUMN),
        quoted(PK_COLUMN)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_model;
    use serde_json::json;

    #[test]
    fn list_applies_filters_search_and_sort() {
        let model = load_model("crm").unwrap();
        let contacts = model.entity_by_path("contacts").unwrap();
        let spec = ListSpec {
            filters: vec![("company_id".into(), json!("2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11"))],
            search: Some("ann".into()),
            sort: vec![("name".into(), SortOrder::Asc)],
            limit: 20,
            offset: 40,
        };
        let q = select_list(contacts, &spec);
        assert!(q.sql.contains(r#"FROM "crm"."contacts""#));
        assert!(q.sql.contains(r#""company_id" = $1::uuid"#));
        assert!(q.sql.contains(r#""name" ILIKE $2 OR "email" ILIKE $2"#));
        assert!(q.sql.contains(r#"ORDER BY "name" ASC, "id" ASC LIMIT 20 OFFSET 40"#));
        assert_eq!(q.params[1], json!("%ann%"));
    }

    #[test]
    fn null_filter_becomes_is_null() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let spec = ListSpec {
            filters: vec![("pipeline_stage".into(), Value::Null)],
            limit: 10,
            ..Default::default()
        };
        let q = count(deals, &spec);
        assert!(q.sql.ends_with(r#"WHERE "pipeline_stage" IS NULL"#));
        assert!(q.params.is_empty());
    }

    #[test]
    fn search_term_escapes_like_metacharacters() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn numeric_selected_as_float_and_sensitive_hidden() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        assert!(select_column_list(deals).contains(r#""amount"::float8 AS "amount""#));
        let hooks = model.entity_by_path("webhooks").unwrap();
        assert!(!select_column_list(hooks).contains("secret"));
    }

    #[test]
    fn update_sets_only_present_columns() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let mut body = HashMap::new();
        body.insert("amount".to_string(), json!(1200));
        let q = update(deals, &json!("2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11"), &body);
        assert!(q.sql.contains(r#"SET "amount" = $1::numeric(14,2), "updated_at" = NOW() WHERE "id" = $2::uuid"#));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn sort_ignores_unknown_columns() {
        let model = load_model("crm").unwrap();
        let companies = model.entity_by_path("companies").unwrap();
        let spec = ListSpec {
            sort: vec![("nope".into(), SortOrder::Desc)],
            limit: 5,
            ..Default::default()
        };
        assert!(select_list(companies, &spec).sql.contains(r#"ORDER BY "id" ASC"#));
    }
}
