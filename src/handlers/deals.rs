//! /deals handlers.
//!
//! A deal records when it entered its current pipeline stage (`stageEnteredAt`); the timestamp is
//! set on create and reset whenever an update moves the deal to a different stage.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{
    body_to_columns, fetch_one, insert_row, list_page, parse_id, parse_uuid_field, patch_row, remove_row, row_str,
};
use crate::response::{deleted, success_one, success_one_ok, success_page};
use crate::service::RequestValidator;
use crate::sql::{qualified_table, quoted};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

const RESOURCE: &str = "deals";
const STAGE_COLUMN: &str = "pipeline_stage";
const STAGE_ENTERED_COLUMN: &str = "stage_entered_at";

/// Stage id in a column-keyed body: `Some(None)` when explicitly cleared.
fn requested_stage(columns: &HashMap<String, Value>) -> Option<Option<&str>> {
    columns.get(STAGE_COLUMN).map(Value::as_str)
}

/// Whether an update moves the deal out of `current`.
fn stage_changed(current: Option<&str>, requested: Option<&str>) -> bool {
    match (current, requested) {
        (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
        (None, None) => false,
        _ => true,
    }
}

async fn ensure_stage_exists(state: &AppState, stage_id: &str) -> Result<(), AppError> {
    let stages = state.entity("pipeline-stages")?;
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1::uuid)",
        qualified_table(stages),
        quoted("id")
    );
    let exists: bool = sqlx::query_scalar(&sql).bind(stage_id).fetch_one(&state.pool).await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::Validation("pipelineStage does not exist".into()))
    }
}

/// Database clock, the same one `created_at` defaults from.
async fn db_now(state: &AppState) -> Result<Value, AppError> {
    let now: DateTime<Utc> = sqlx::query_scalar("SELECT NOW()").fetch_one(&state.pool).await?;
    Ok(Value::String(now.to_rfc3339()))
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
    let mut columns = body_to_columns(entity, body)?;
    RequestValidator::validate(entity, &columns)?;

    if columns.get("owner_user_id").map_or(true, Value::is_null) {
        columns.insert("owner_user_id".into(), Value::String(user.to_string()));
    }
    if let Some(Some(stage)) = requested_stage(&columns).map(|s| s.map(str::to_string)) {
        ensure_stage_exists(&state, &stage).await?;
        columns.insert(STAGE_ENTERED_COLUMN.into(), db_now(&state).await?);
    }

    let row = insert_row(&state, entity, columns, user).await?;
    tracing::info!(id = ?row.get("id"), stage = ?row.get("pipelineStage"), "deal created");
    Ok(success_one(row))
}

pub async fn read(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    Ok(success_one_ok(fetch_one(&state, entity, id).await?))
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
    let mut columns = body_to_columns(entity, body)?;
    RequestValidator::validate_partial(entity, &columns)?;

    if let Some(requested) = requested_stage(&columns).map(|s| s.map(str::to_string)) {
        let current = fetch_one(&state, entity, id).await?;
        if stage_changed(row_str(&current, "pipelineStage"), requested.as_deref()) {
            let entered = match requested.as_deref() {
                Some(stage) => {
                    ensure_stage_exists(&state, stage).await?;
                    db_now(&state).await?
                }
                None => Value::Null,
            };
            tracing::debug!(%id, from = ?row_str(&current, "pipelineStage"), to = ?requested, "deal changed stage");
            columns.insert(STAGE_ENTERED_COLUMN.into(), entered);
        }
    }

    let row = patch_row(&state, entity, id, columns, user).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require()?;
    let entity = state.entity(RESOURCE)?;
    let id = parse_id(&id, entity)?;
    remove_row(&state, entity, id).await?;
    tracing::info!(%id, "deal deleted");
    Ok(deleted(id))
}

#[derive(Serialize)]
pub struct Reassigned {
    pub success: bool,
    pub reassigned: u64,
}

/// `{ fromUserId, toUserId }`, both required and distinct.
fn parse_reassign(body: &Value) -> Result<(Uuid, Uuid), AppError> {
    if !body.is_object() {
        return Err(AppError::BadRequest("Request body must be a JSON object".into()));
    }
    let from = parse_uuid_field("fromUserId", body.get("fromUserId"))?;
    let to = parse_uuid_field("toUserId", body.get("toUserId"))?;
    if from == to {
        return Err(AppError::Validation("fromUserId and toUserId must differ".into()));
    }
    Ok((from, to))
}

async fn reassign_owner(state: &AppState, entity: &ResolvedEntity, from: Uuid, to: Uuid, actor: Uuid) -> Result<u64, AppError> {
    let sql = format!(
        "UPDATE {} SET {owner} = $2, {} = NOW(), {} = $3 WHERE {owner} = $1",
        qualified_table(entity),
        quoted("updated_at"),
        quoted("updated_by"),
        owner = quoted("owner_user_id"),
    );
    let result = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .bind(actor)
        .execute(&state.pool)
        .await?;
    Ok(result.rows_affected())
}

/// POST /deals/reassign: move every deal owned by one user to another.
pub async fn reassign(
    State(state): State<AppState>,
    user: SessionUser,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.require()?;
    let (from, to) = parse_reassign(&body)?;
    let entity = state.entity(RESOURCE)?;
    let reassigned = reassign_owner(&state, entity, from, to, actor).await?;
    tracing::info!(%from, %to, reassigned, "deals reassigned");
    Ok(Json(Reassigned {
        success: true,
        reassigned,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11";
    const B: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    #[test]
    fn stage_change_detection() {
        assert!(!stage_changed(Some(A), Some(A)));
        assert!(!stage_changed(Some(A), Some(&A.to_uppercase())));
        assert!(stage_changed(Some(A), Some(B)));
        assert!(stage_changed(None, Some(A)));
        assert!(stage_changed(Some(A), None));
        assert!(!stage_changed(None, None));
    }

    #[test]
    fn requested_stage_distinguishes_absent_and_cleared() {
        let mut cols = HashMap::new();
        assert_eq!(requested_stage(&cols), None);
        cols.insert(STAGE_COLUMN.to_string(), Value::Null);
        assert_eq!(requested_stage(&cols), Some(None));
        cols.insert(STAGE_COLUMN.to_string(), json!(A));
        assert_eq!(requested_stage(&cols), Some(Some(A)));
    }

    #[test]
    fn reassign_body_rules() {
        assert!(parse_reassign(&json!({ "fromUserId": A, "toUserId": B })).is_ok());
        assert_eq!(
            parse_reassign(&json!({ "fromUserId": A })).unwrap_err().to_string(),
            "toUserId is required"
        );
        assert_eq!(
            parse_reassign(&json!({ "fromUserId": A, "toUserId": A })).unwrap_err().to_string(),
            "fromUserId and toUserId must differ"
        );
        assert!(parse_reassign(&json!([A, B])).is_err());
    }
}
