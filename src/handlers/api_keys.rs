//! /api-keys handlers: issue, list and revoke the caller's data-export keys.

use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{fetch_one, insert_row, list_page, not_found, parse_id, remove_row, row_str};
use crate::response::{deleted, success_one, success_page};
use crate::service::api_keys::{display_prefix, generate_key, hash_key};
use crate::service::RequestValidator;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;

const RESOURCE: &str = "api-keys";
const MAX_EXPIRY_DAYS: u64 = 3650;

fn expires_in_days(body: &Value) -> Result<Option<i64>, AppError> {
    match body.get("expiresInDays") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|d| (1..=MAX_EXPIRY_DAYS).contains(d))
            .map(|d| Some(d as i64))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "expiresInDays must be an integer between 1 and {}",
                    MAX_EXPIRY_DAYS
                ))
            }),
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let scope = vec![("user_id".to_string(), Value::String(user.to_string()))];
    let (rows, meta) = list_page(&state, entity, &params, scope).await?;
    Ok(success_page(rows, meta))
}

/// The plaintext key is returned in this response only.
pub async fn create(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    if !body.is_object() {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    }
    let days = expires_in_days(&body)?;

    let key = generate_key();
    let mut columns: HashMap<String, Value> = HashMap::new();
    if let Some(name) = body.get("name") {
        columns.insert("name".into(), name.clone());
    }
    RequestValidator::validate(entity, &columns)?;
    columns.insert("key_hash".into(), Value::String(hash_key(&key)));
    columns.insert("key_prefix".into(), Value::String(display_prefix(&key)));
    columns.insert("user_id".into(), Value::String(user.to_string()));
    if let Some(days) = days {
        let expires = Utc::now() + Duration::days(days);
        columns.insert("expires_at".into(), Value::String(expires.to_rfc3339()));
    }

    let mut row = insert_row(&state, entity, columns, user).await?;
    tracing::info!(id = ?row.get("id"), prefix = %display_prefix(&key), "API key issued");
    if let Value::Object(map) = &mut row {
        map.insert("key".into(), Value::String(key));
    }
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    let current = fetch_one(&state, entity, id).await?;
    if row_str(&current, "userId") != Some(user.to_string().as_str()) {
        return Err(not_found(entity));
    }
    remove_row(&state, entity, id).await?;
    tracing::info!(%id, "API key revoked");
    Ok(deleted(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expiry_days_bounds() {
        assert_eq!(expires_in_days(&json!({})).unwrap(), None);
        assert_eq!(expires_in_days(&json!({ "expiresInDays": 30 })).unwrap(), Some(30));
        assert!(expires_in_days(&json!({ "expiresInDays": 0 })).is_err());
        assert!(expires_in_days(&json!({ "expiresInDays": "30" })).is_err());
        assert!(expires_in_days(&json!({ "expiresInDays": 99999 })).is_err());
    }
}
