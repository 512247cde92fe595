//! Generic CRUD execution against PostgreSQL. Rows come back as JSON objects keyed by API field name.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::sql::{count, delete, insert, select_all, select_by_id, select_list, update, ListSpec, PgBindValue, QueryBuf};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub struct CrudService;

/// One page of rows plus the unpaged total.
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
}

impl CrudService {
    pub async fn list(pool: &PgPool, entity: &ResolvedEntity, spec: &ListSpec) -> Result<Page, AppError> {
        let q = select_list(entity, spec);
        let rows = Self::query_many(pool, entity, &q).await?;
        let c = count(entity, spec);
        tracing::debug!(sql = %c.sql, params = ?c.params, "count");
        let mut query = sqlx::query_scalar::<_, i64>(&c.sql);
        for p in &c.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let total = query.fetch_one(pool).await?;
        Ok(Page {
            rows,
            total: total.max(0) as u64,
        })
    }

    /// Every row of the entity in default order.
    pub async fn list_all(pool: &PgPool, entity: &ResolvedEntity) -> Result<Vec<Value>, AppError> {
        let q = select_all(entity);
        Self::query_many(pool, entity, &q).await
    }

    /// Fetch one row by primary key.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<Option<Value>, AppError> {
        let mut q = select_by_id(entity);
        q.params.push(Value::String(id.to_string()));
        Self::query_optional(pool, entity, &q).await
    }

    /// Insert one row from column-keyed body. Returns created row.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let q = insert(entity, body);
        Self::query_optional(pool, entity, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Patch one row by id with the columns present in body. Returns updated row or None when missing.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: Uuid,
        body: &HashMap<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = update(entity, &Value::String(id.to_string()), body);
        Self::query_optional(pool, entity, &q).await
    }

    /// Delete one row by id. Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: Uuid) -> Result<bool, AppError> {
        let q = delete(entity);
        tracing::debug!(sql = %q.sql, id = %id, "delete");
        let removed = sqlx::query(&q.sql)
            .bind(PgBindValue::Text(id.to_string()))
            .fetch_optional(pool)
            .await?;
        Ok(removed.is_some())
    }

    async fn query_optional(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(pool).await?;
        Ok(row.map(|r| to_api(entity, row_to_json(&r))))
    }

    async fn query_many(pool: &PgPool, entity: &ResolvedEntity, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(pool).await?;
        Ok(rows.iter().map(|r| to_api(entity, row_to_json(r))).collect())
    }
}

/// Rename column keys to API field names and drop sensitive columns.
pub fn to_api(entity: &ResolvedEntity, row: Value) -> Value {
    let Value::Object(map) = row else { return row };
    let mut out = Map::with_capacity(map.len());
    for (k, v) in map {
        match entity.column(&k) {
            Some(c) if c.sensitive => {}
            Some(c) => {
                out.insert(c.api_name.clone(), v);
            }
            None => {
                out.insert(crate::case::to_camel_case(&k), v);
            }
        }
    }
    Value::Object(out)
}

pub(crate) fn row_to_json(row: &sqlx::postgres::PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        map.insert(name.to_string(), v);
    }
    Value::Object(map)
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
