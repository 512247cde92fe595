//! /reports/* and /metrics handlers. Read-only; open to anonymous callers like other reads.

use crate::error::AppError;
use crate::handlers::common::is_canonical_uuid;
use crate::service::reports::{self, ReportFilter};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use uuid::Uuid;

const DEFAULT_WEEKS: u32 = 8;
const MAX_WEEKS: u32 = 52;
const MAX_STALE_DAYS: u32 = 3650;

fn parse_date(params: &HashMap<String, String>, key: &str) -> Result<Option<NaiveDate>, AppError> {
    match params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", key))),
    }
}

/// `startDate`, `endDate`, `ownerUserId`.
pub fn report_filter(params: &HashMap<String, String>) -> Result<ReportFilter, AppError> {
    let start_date = parse_date(params, "startDate")?;
    let end_date = parse_date(params, "endDate")?;
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(AppError::Validation("startDate must not be after endDate".into()));
        }
    }
    let owner_user_id = match params.get("ownerUserId").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) if is_canonical_uuid(raw) => Uuid::parse_str(raw).ok(),
        Some(_) => return Err(AppError::Validation("ownerUserId must be a valid UUID".into())),
    };
    Ok(ReportFilter {
        start_date,
        end_date,
        owner_user_id,
    })
}

/// Unparseable values fall back to the default; out-of-range values are clamped.
fn bounded(params: &HashMap<String, String>, key: &str, default: u32, max: u32) -> u32 {
    params
        .get(key)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
        .clamp(1, max)
}

pub async fn acv(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filter = report_filter(&params)?;
    Ok(Json(reports::acv(&state.pool, &state.model, &filter).await?))
}

pub async fn close_rate(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filter = report_filter(&params)?;
    Ok(Json(reports::close_rate(&state.pool, &state.model, &filter).await?))
}

pub async fn sales_cycle(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let filter = report_filter(&params)?;
    Ok(Json(reports::sales_cycle(&state.pool, &state.model, &filter).await?))
}

pub async fn pipeline_health(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let stale_after = bounded(&params, "staleAfterDays", state.settings.stale_deal_days, MAX_STALE_DAYS);
    Ok(Json(reports::pipeline_health(&state.pool, &state.model, stale_after).await?))
}

pub async fn metrics(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let weeks = bounded(&params, "weeks", DEFAULT_WEEKS, MAX_WEEKS);
    let today = Utc::now().date_naive();
    Ok(Json(reports::metrics(&state.pool, &state.model, weeks, today).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn filter_parses_dates_and_owner() {
        let f = report_filter(&params(&[
            ("startDate", "2026-01-01"),
            ("endDate", "2026-03-31"),
            ("ownerUserId", "2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11"),
        ]))
        .unwrap();
        assert_eq!(f.start_date, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert!(f.owner_user_id.is_some());
        assert!(report_filter(&params(&[])).unwrap().start_date.is_none());
    }

    #[test]
    fn filter_rejects_bad_values() {
        assert_eq!(
            report_filter(&params(&[("startDate", "01/02/2026")])).unwrap_err().to_string(),
            "startDate must be a date (YYYY-MM-DD)"
        );
        assert!(report_filter(&params(&[("startDate", "2026-05-01"), ("endDate", "2026-04-01")])).is_err());
        assert!(report_filter(&params(&[("ownerUserId", "me")])).is_err());
    }

    #[test]
    fn bounded_params() {
        assert_eq!(bounded(&params(&[]), "weeks", 8, 52), 8);
        assert_eq!(bounded(&params(&[("weeks", "x")]), "weeks", 8, 52), 8);
        assert_eq!(bounded(&params(&[("weeks", "0")]), "weeks", 8, 52), 1);
        assert_eq!(bounded(&params(&[("weeks", "99")]), "weeks", 8, 52), 52);
        assert_eq!(bounded(&params(&[("weeks", "12")]), "weeks", 8, 52), 12);
    }
}
