//! GET /data-export: full JSON dump of the CRM records, authenticated by API key.

use crate::error::AppError;
use crate::extractors::BearerToken;
use crate::service::api_keys;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Entities in the dump, in output order.
pub const EXPORTABLE: &[&str] = &["contacts", "companies", "deals", "activities"];

#[derive(Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

fn export_format(params: &HashMap<String, String>) -> Result<ExportFormat, AppError> {
    match params.get("format").map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("json") => Ok(ExportFormat::Json),
        Some("csv") => Ok(ExportFormat::Csv),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unsupported export format '{}'; use json or csv",
            other
        ))),
    }
}

/// `entities=contacts,deals` narrows the dump; default is everything.
fn export_entities(params: &HashMap<String, String>) -> Result<Vec<&'static str>, AppError> {
    let Some(raw) = params.get("entities").filter(|s| !s.trim().is_empty()) else {
        return Ok(EXPORTABLE.to_vec());
    };
    let requested: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if let Some(unknown) = requested.iter().find(|r| !EXPORTABLE.contains(r)) {
        return Err(AppError::BadRequest(format!("Unknown export entity: {}", unknown)));
    }
    Ok(EXPORTABLE
        .iter()
        .copied()
        .filter(|e| requested.contains(e))
        .collect())
}

pub async fn export(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let token = token.ok_or_else(|| AppError::Unauthorized("Missing or malformed Authorization header".into()))?;
    let keys = state.entity("api-keys")?;
    let key = api_keys::authenticate(&state.pool, keys, &token).await?;

    if export_format(&params)? == ExportFormat::Csv {
        return Err(AppError::NotImplemented("CSV export is not implemented".into()));
    }
    let entities = export_entities(&params)?;

    let mut out = Map::new();
    out.insert("exportedAt".into(), Value::String(Utc::now().to_rfc3339()));
    for path in &entities {
        let entity = state.entity(path)?;
        let rows = CrudService::list_all(&state.pool, entity).await?;
        out.insert((*path).to_string(), Value::Array(rows));
    }
    tracing::info!(key_id = %key.id, user_id = %key.user_id, ?entities, "data exported");
    Ok(Json(Value::Object(out)))
}
