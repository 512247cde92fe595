//! /activities handlers. Listing also serves recent-activity feeds through `limit`.

use crate::error::AppError;
use crate::extractors::{JsonBody, SessionUser};
use crate::handlers::common::{
    create_from_body, fetch_one, list_page, parse_id, remove_row, update_from_body, MAX_PAGE_SIZE,
};
use crate::response::{deleted, success_one, success_one_ok, success_page};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::collections::HashMap;

const RESOURCE: &str = "activities";

const DEFAULT_FEED_LIMIT: u32 = 50;

/// `limit` replaces `pageSize` and pins the first page.
fn apply_feed_limit(params: &mut HashMap<String, String>) {
    let Some(raw) = params.remove("limit") else { return };
    let limit = raw
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|l| *l >= 1)
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .min(MAX_PAGE_SIZE);
    params.insert("pageSize".into(), limit.to_string());
    params.insert("page".into(), "1".into());
}

pub async fn list(
    State(state): State<AppState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    apply_feed_limit(&mut params);
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
    let row = create_from_body(&state, entity, body, user).await?;
    tracing::info!(id = ?row.get("id"), "activity logged");
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
    let row = update_from_body(&state, entity, id, body, user).await?;
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
    tracing::info!(%id, "activity deleted");
    Ok(deleted(id))
}
