//! /webhooks handlers: subscription configuration only. `secret` is accepted but never returned.
//!
//! Besides the path-id routes, updates may carry the id in the body (`PUT /webhooks`) and deletes
//! in the query string (`DELETE /webhooks?id=...`).

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{
    body_to_columns, fetch_one, insert_row, list_page, parse_id, patch_row, remove_row,
};
use crate::response::{deleted, success_one, success_one_ok, success_page};
use crate::service::RequestValidator;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

const RESOURCE: &str = "webhooks";

fn check_events(columns: &HashMap<String, Value>) -> Result<(), AppError> {
    match columns.get("events") {
        None => Ok(()),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
        Some(_) => Err(AppError::Validation("events must be an array of strings".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(RESOURCE)?;
    let (rows, meta) = list_page(&state, entity, &params, Vec::new()).await?;
    Ok(success_page(rows, meta))
}

pub async fn create(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let columns = body_to_columns(entity, body)?;
    RequestValidator::validate(entity, &columns)?;
    check_events(&columns)?;
    let row = insert_row(&state, entity, columns, user).await?;
    tracing::info!(id = ?row.get("id"), url = ?row.get("url"), "webhook registered");
    Ok(success_one(row))
}

pub async fn read(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    Ok(success_one_ok(fetch_one(&state, entity, id).await?))
}

async fn apply_update(state: &AppState, entity: &ResolvedEntity, id: Uuid, body: Value, user: Uuid) -> Result<Value, AppError> {
    let columns = body_to_columns(entity, body)?;
    RequestValidator::validate_partial(entity, &columns)?;
    check_events(&columns)?;
    patch_row(state, entity, id, columns, user).await
}

pub async fn update(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    Ok(success_one_ok(apply_update(&state, entity, id, body, user).await?))
}

/// PUT /webhooks with `id` in the body.
pub async fn update_by_body(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let raw = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation("Webhook ID is required".into()))?;
    let id = parse_id(raw, entity)?;
    Ok(success_one_ok(apply_update(&state, entity, id, body, user).await?))
}

async fn remove(state: &AppState, entity: &ResolvedEntity, id: Uuid) -> Result<(), AppError> {
    remove_row(state, entity, id).await?;
    tracing::info!(%id, "webhook deleted");
    Ok(())
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    remove(&state, entity, id).await?;
    Ok(deleted(id))
}

/// DELETE /webhooks?id=...
pub async fn delete_by_query(
    State(state): State<AppState>,
    user: SessionUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    user.require()?;
    let entity = state.entity(RESOURCE)?;
    let raw = params
        .get("id")
        .ok_or_else(|| AppError::Validation("Webhook ID is required".into()))?;
    let id = parse_id(raw, entity)?;
    remove(&state, entity, id).await?;
    Ok(deleted(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_must_be_strings() {
        let mut cols = HashMap::new();
        assert!(check_events(&cols).is_ok());
        cols.insert("events".to_string(), json!(["deal.created", "contact.updated"]));
        assert!(check_events(&cols).is_ok());
        cols.insert("events".to_string(), json!(["deal.created", 3]));
        assert!(check_events(&cols).is_err());
        cols.insert("events".to_string(), json!("deal.created"));
        assert_eq!(check_events(&cols).unwrap_err().to_string(), "events must be an array of strings");
    }
}
