//! Shared handler plumbing: id parsing, list query parsing, body mapping, and single-row helpers.

use crate::case::to_snake_case;
use crate::config::{ResolvedEntity, SortOrder};
use crate::error::AppError;
use crate::response::PageMeta;
pub use crate::service::is_canonical_uuid;
use crate::service::{CrudService, RequestValidator};
use crate::sql::ListSpec;
use crate::state::AppState;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Upper bound for `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Path id for `entity`, or 400 `Invalid <entity> ID format`.
pub fn parse_id(raw: &str, entity: &ResolvedEntity) -> Result<Uuid, AppError> {
    let invalid = || AppError::BadRequest(format!("Invalid {} ID format", entity.label));
    if !is_canonical_uuid(raw) {
        return Err(invalid());
    }
    Uuid::parse_str(raw).map_err(|_| invalid())
}

/// UUID carried in a body or query field.
pub fn parse_uuid_field(field: &str, v: Option<&Value>) -> Result<Uuid, AppError> {
    let s = v
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))?;
    if !is_canonical_uuid(s) {
        return Err(AppError::Validation(format!("{} must be a valid UUID", field)));
    }
    Uuid::parse_str(s).map_err(|_| AppError::Validation(format!("{} must be a valid UUID", field)))
}

pub fn not_found(entity: &ResolvedEntity) -> AppError {
    AppError::NotFound(format!("{} not found", entity.title()))
}

/// Parsed list query: page window plus the SQL list spec.
#[derive(Debug)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub spec: ListSpec,
}

/// Parse `page`, `pageSize`, `search`, `sortBy`, `sortOrder` and the entity's filters.
/// Unparseable numbers fall back to defaults; filter values on UUID columns must be UUIDs.
pub fn list_query(
    entity: &ResolvedEntity,
    params: &HashMap<String, String>,
    default_page_size: u32,
) -> Result<ListQuery, AppError> {
    let page = params
        .get("page")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let page_size = params
        .get("pageSize")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(default_page_size)
        .min(MAX_PAGE_SIZE);

    let order = match params.get("sortOrder").map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("asc") => SortOrder::Asc,
        _ => SortOrder::Desc,
    };
    let sort = params
        .get("sortBy")
        .and_then(|api| entity.column_by_api_name(api))
        .filter(|c| entity.sortable.contains(&c.name))
        .map(|c| vec![(c.name.clone(), order)])
        .unwrap_or_else(|| entity.default_sort.clone());

    let mut filters = Vec::new();
    for col in &entity.filters {
        let Some(info) = entity.column(col) else { continue };
        let Some(raw) = params.get(&info.api_name) else { continue };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        if info.is_uuid() && !is_canonical_uuid(raw) {
            return Err(AppError::Validation(format!("{} must be a valid UUID", info.api_name)));
        }
        filters.push((col.clone(), Value::String(raw.to_string())));
    }

    let search = params
        .get("search")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(ListQuery {
        page,
        page_size,
        spec: ListSpec {
            filters,
            search,
            sort,
            limit: page_size,
            offset: (page - 1).saturating_mul(page_size),
        },
    })
}

/// Map a camelCase request body onto writable columns. Unknown and protected keys are dropped.
pub fn body_to_columns(entity: &ResolvedEntity, body: Value) -> Result<HashMap<String, Value>, AppError> {
    let Value::Object(map) = body else {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    };
    let mut out = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let column = entity
            .column_by_api_name(&key)
            .or_else(|| entity.column(&to_snake_case(&key)));
        match column {
            Some(c) if c.writable => {
                out.insert(c.name.clone(), value);
            }
            _ => {}
        }
    }
    Ok(out)
}

/// One page of rows plus meta. `scope` filters are applied on top of the request's own.
pub async fn list_page(
    state: &AppState,
    entity: &ResolvedEntity,
    params: &HashMap<String, String>,
    scope: Vec<(String, Value)>,
) -> Result<(Vec<Value>, PageMeta), AppError> {
    let mut query = list_query(entity, params, state.settings.default_page_size)?;
    query.spec.filters.extend(scope);
    let page = CrudService::list(&state.pool, entity, &query.spec).await?;
    Ok((page.rows, PageMeta::new(query.page, query.page_size, page.total)))
}

pub async fn fetch_one(state: &AppState, entity: &ResolvedEntity, id: Uuid) -> Result<Value, AppError> {
    CrudService::read(&state.pool, entity, id)
        .await?
        .ok_or_else(|| not_found(entity))
}

/// Insert already validated columns, stamping the acting user.
pub async fn insert_row(
    state: &AppState,
    entity: &ResolvedEntity,
    mut columns: HashMap<String, Value>,
    user: Uuid,
) -> Result<Value, AppError> {
    columns.insert("created_by".into(), Value::String(user.to_string()));
    columns.insert("updated_by".into(), Value::String(user.to_string()));
    CrudService::create(&state.pool, entity, &columns).await
}

/// Patch already validated columns, stamping the acting user. 404 when the row is gone.
pub async fn patch_row(
    state: &AppState,
    entity: &ResolvedEntity,
    id: Uuid,
    mut columns: HashMap<String, Value>,
    user: Uuid,
) -> Result<Value, AppError> {
    columns.insert("updated_by".into(), Value::String(user.to_string()));
    CrudService::update(&state.pool, entity, id, &columns)
        .await?
        .ok_or_else(|| not_found(entity))
}

pub async fn remove_row(state: &AppState, entity: &ResolvedEntity, id: Uuid) -> Result<(), AppError> {
    if CrudService::delete(&state.pool, entity, id).await? {
        Ok(())
    } else {
        Err(not_found(entity))
    }
}

/// Create: map body, validate, insert.
pub async fn create_from_body(
    state: &AppState,
    entity: &ResolvedEntity,
    body: Value,
    user: Uuid,
) -> Result<Value, AppError> {
    let columns = body_to_columns(entity, body)?;
    RequestValidator::validate(entity, &columns)?;
    insert_row(state, entity, columns, user).await
}

/// Update: map body, validate present fields, patch.
pub async fn update_from_body(
    state: &AppState,
    entity: &ResolvedEntity,
    id: Uuid,
    body: Value,
    user: Uuid,
) -> Result<Value, AppError> {
    let columns = body_to_columns(entity, body)?;
    RequestValidator::validate_partial(entity, &columns)?;
    patch_row(state, entity, id, columns, user).await
}

/// String value of an API field in a row returned by the CRUD service.
pub fn row_str<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_model;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parse_id_requires_canonical_uuid() {
        let model = load_model("crm").unwrap();
        let contacts = model.entity_by_path("contacts").unwrap();
        let err = parse_id("not-a-uuid", contacts).unwrap_err();
        assert_eq!(err.to_string(), "Invalid contact ID format");
        assert!(parse_id("2d1f3c9e3c554a0e9c596b6f0b0f6d11", contacts).is_err());
        assert!(parse_id("2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11", contacts).is_ok());
    }

    #[test]
    fn list_query_defaults_and_caps() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let q = list_query(deals, &params(&[("page", "x"), ("pageSize", "500")]), 20).unwrap();
        assert_eq!((q.page, q.page_size), (1, MAX_PAGE_SIZE));
        let q = list_query(deals, &params(&[("page", "3"), ("pageSize", "10")]), 20).unwrap();
        assert_eq!(q.spec.offset, 20);
        assert_eq!(q.spec.sort, deals.default_sort);
    }

    #[test]
    fn list_query_sort_whitelist() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let q = list_query(deals, &params(&[("sortBy", "amount"), ("sortOrder", "asc")]), 20).unwrap();
        assert_eq!(q.spec.sort, vec![("amount".to_string(), SortOrder::Asc)]);
        let q = list_query(deals, &params(&[("sortBy", "ownerUserId")]), 20).unwrap();
        assert_eq!(q.spec.sort, deals.default_sort);
    }

    #[test]
    fn list_query_filters_by_api_name() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let id = "2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11";
        let q = list_query(deals, &params(&[("pipelineStage", id), ("name", "x")]), 20).unwrap();
        assert_eq!(q.spec.filters, vec![("pipeline_stage".to_string(), json!(id))]);
        let err = list_query(deals, &params(&[("companyId", "acme")]), 20).unwrap_err();
        assert_eq!(err.to_string(), "companyId must be a valid UUID");
    }

    #[test]
    fn body_maps_api_names_and_drops_protected_fields() {
        let model = load_model("crm").unwrap();
        let stages = model.entity_by_path("pipeline-stages").unwrap();
        let cols = body_to_columns(
            stages,
            json!({ "code": "demo", "order": 3, "isSystem": true, "id": "x", "createdBy": "y", "bogus": 1 }),
        )
        .unwrap();
        assert_eq!(cols.get("display_order"), Some(&json!(3)));
        assert_eq!(cols.get("code"), Some(&json!("demo")));
        assert_eq!(cols.len(), 2);
        assert!(body_to_columns(stages, json!([1, 2])).is_err());
    }

    #[test]
    fn uuid_field_messages() {
        assert_eq!(
            parse_uuid_field("fromUserId", None).unwrap_err().to_string(),
            "fromUserId is required"
        );
        assert_eq!(
            parse_uuid_field("toUserId", Some(&json!("bob"))).unwrap_err().to_string(),
            "toUserId must be a valid UUID"
        );
    }
}
