//! /personal-notes handlers. Notes are private: every operation is scoped to the session user.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{
    body_to_columns, fetch_one, insert_row, list_page, not_found, parse_id, remove_row, row_str, update_from_body,
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

const RESOURCE: &str = "personal-notes";

/// The note, or 404 when it belongs to someone else.
async fn owned_note(state: &AppState, entity: &ResolvedEntity, id: Uuid, user: Uuid) -> Result<Value, AppError> {
    let note = fetch_one(state, entity, id).await?;
    if row_str(&note, "userId") != Some(user.to_string().as_str()) {
        return Err(not_found(entity));
    }
    Ok(note)
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

pub async fn create(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let mut columns = body_to_columns(entity, body)?;
    RequestValidator::validate(entity, &columns)?;
    columns.insert("user_id".into(), Value::String(user.to_string()));
    let row = insert_row(&state, entity, columns, user).await?;
    Ok(success_one(row))
}

pub async fn read(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    Ok(success_one_ok(owned_note(&state, entity, id, user).await?))
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
    owned_note(&state, entity, id, user).await?;
    let row = update_from_body(&state, entity, id, body, user).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    owned_note(&state, entity, id, user).await?;
    remove_row(&state, entity, id).await?;
    Ok(deleted(id))
}
