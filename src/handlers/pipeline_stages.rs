//! /pipeline-stages handlers: ordered stage CRUD and bulk reorder.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{
    body_to_columns, fetch_one, insert_row, is_canonical_uuid, list_page, parse_id, patch_row, remove_row, row_str,
};
use crate::response::{deleted, success_one, success_one_ok, success_page};
use crate::service::{CrudService, RequestValidator};
use crate::sql::{qualified_table, quoted};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

const RESOURCE: &str = "pipeline-stages";

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(RESOURCE)?;
    let (rows, meta) = list_page(&state, entity, &params, Vec::new()).await?;
    Ok(success_page(rows, meta))
}

async fn next_order(state: &AppState, entity: &ResolvedEntity) -> Result<i32, AppError> {
    let sql = format!(
        "SELECT COALESCE(MAX({}), 0) + 1 FROM {}",
        quoted("display_order"),
        qualified_table(entity)
    );
    Ok(sqlx::query_scalar(&sql).fetch_one(&state.pool).await?)
}

async fn code_taken(state: &AppState, entity: &ResolvedEntity, code: &str) -> Result<bool, AppError> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
        qualified_table(entity),
        quoted("code")
    );
    Ok(sqlx::query_scalar(&sql).bind(code).fetch_one(&state.pool).await?)
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

    if let Some(code) = columns.get("code").and_then(Value::as_str) {
        if code_taken(&state, entity, code).await? {
            return Err(AppError::Validation(format!(
                "A pipeline stage with code '{}' already exists",
                code
            )));
        }
    }
    if columns.get("display_order").map_or(true, Value::is_null) {
        let order = next_order(&state, entity).await?;
        columns.insert("display_order".into(), Value::from(order));
    }

    let row = insert_row(&state, entity, columns, user).await?;
    tracing::info!(id = ?row.get("id"), code = ?row.get("code"), "pipeline stage created");
    Ok(success_one(row))
}

pub async fn read(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    Ok(success_one_ok(fetch_one(&state, entity, id).await?))
}

/// Code may be resent unchanged but never altered.
fn check_code_unchanged(current: &Value, columns: &HashMap<String, Value>) -> Result<(), AppError> {
    match columns.get("code") {
        None => Ok(()),
        Some(requested) if requested.as_str() == row_str(current, "code") => Ok(()),
        Some(_) => Err(AppError::Validation("Stage code cannot be changed".into())),
    }
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
    let columns = body_to_columns(entity, body)?;
    RequestValidator::validate_partial(entity, &columns)?;
    let current = fetch_one(&state, entity, id).await?;
    check_code_unchanged(&current, &columns)?;
    let row = patch_row(&state, entity, id, columns, user).await?;
    Ok(success_one_ok(row))
}

async fn assigned_deals(state: &AppState, stage: Uuid) -> Result<i64, AppError> {
    let deals = state.entity("deals")?;
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = $1",
        qualified_table(deals),
        quoted("pipeline_stage")
    );
    Ok(sqlx::query_scalar(&sql).bind(stage).fetch_one(&state.pool).await?)
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    let current = fetch_one(&state, entity, id).await?;
    if current.get("isSystem").and_then(Value::as_bool) == Some(true) {
        return Err(AppError::Validation("System stages cannot be deleted".into()));
    }
    let deals = assigned_deals(&state, id).await?;
    if deals > 0 {
        return Err(AppError::Validation(format!(
            "Cannot delete a stage with {} deal(s) assigned",
            deals
        )));
    }
    remove_row(&state, entity, id).await?;
    tracing::info!(%id, code = ?row_str(&current, "code"), "pipeline stage deleted");
    Ok(deleted(id))
}

/// `[{ id, order }, ...]` or `{ stages: [...] }`.
fn parse_reorder(body: &Value) -> Result<Vec<(Uuid, i32)>, AppError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("stages") {
            Some(Value::Array(items)) => items,
            _ => return Err(AppError::BadRequest("stages must be an array".into())),
        },
        _ => return Err(AppError::BadRequest("Body must be an array of { id, order }".into())),
    };
    items
        .iter()
        .map(|item| {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .filter(|s| is_canonical_uuid(s))
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| AppError::BadRequest("Invalid pipeline stage ID format".into()))?;
            let order = item
                .get("order")
                .and_then(Value::as_u64)
                .and_then(|o| i32::try_from(o).ok())
                .ok_or_else(|| AppError::Validation("order must be a non-negative integer".into()))?;
            Ok((id, order))
        })
        .collect()
}

/// PUT /pipeline-stages/reorder. All positions change in one transaction; an unknown id rolls back.
pub async fn reorder(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let user = user.require()?;
    let moves = parse_reorder(&body)?;
    let entity = state.entity(RESOURCE)?;
    let sql = format!(
        "UPDATE {} SET {} = $1, {} = NOW(), {} = $3 WHERE {} = $2",
        qualified_table(entity),
        quoted("display_order"),
        quoted("updated_at"),
        quoted("updated_by"),
        quoted("id")
    );

    let mut tx = state.pool.begin().await?;
    for (id, order) in &moves {
        let result = sqlx::query(&sql)
            .bind(*order)
            .bind(*id)
            .bind(user)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::warn!(%id, "reorder aborted: unknown stage");
            return Err(AppError::NotFound("Pipeline stage not found".into()));
        }
    }
    tx.commit().await?;
    tracing::info!(count = moves.len(), "pipeline stages reordered");

    let stages = CrudService::list_all(&state.pool, entity).await?;
    Ok(success_one_ok(stages))
}
