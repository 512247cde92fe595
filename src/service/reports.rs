//! Read-only aggregates over deals and pipeline stages: KPIs, pipeline health, dashboard metrics.
//!
//! Each report is one aggregate query; derived figures (rates, shares, zero-filled weeks)
//! are computed here so they can be tested without a database.

use crate::config::ResolvedModel;
use crate::error::{AppError, ConfigError};
use crate::sql::qualified_table;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Stage code of won deals.
pub const WON_STAGE: &str = "closed_won";
/// Stage code of lost deals.
pub const LOST_STAGE: &str = "closed_lost";

pub fn is_closed_stage(code: &str) -> bool {
    code == WON_STAGE || code == LOST_STAGE
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Optional narrowing shared by the KPI reports.
#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    /// Inclusive lower bound on `stage_entered_at`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound (whole day) on `stage_entered_at`.
    pub end_date: Option<NaiveDate>,
    pub owner_user_id: Option<Uuid>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloseRate {
    pub close_rate: f64,
    pub won: i64,
    pub lost: i64,
    pub total: i64,
}

impl CloseRate {
    pub fn from_counts(won: i64, lost: i64) -> Self {
        let total = won + lost;
        let close_rate = if total > 0 {
            round2(won as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        CloseRate {
            close_rate,
            won,
            lost,
            total,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Acv {
    pub acv: f64,
    pub total_value: f64,
    pub won_deals: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SalesCycle {
    pub average_days: f64,
    pub median_days: f64,
    pub min_days: f64,
    pub max_days: f64,
    pub deal_count: i64,
}

/// One row of the stage grouping query.
#[derive(Debug, Clone)]
pub struct StageAggregate {
    pub stage_id: Uuid,
    pub code: String,
    pub name: String,
    pub order: i32,
    pub deal_count: i64,
    pub total_value: f64,
    pub average_days_in_stage: Option<f64>,
    pub stale_deals: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageHealth {
    pub stage_id: Uuid,
    pub code: String,
    pub name: String,
    pub order: i32,
    pub deal_count: i64,
    pub total_value: f64,
    pub average_days_in_stage: f64,
    pub stale_deals: i64,
    /// Percentage of all pipeline value sitting in this stage.
    pub share_of_value: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineHealth {
    pub stages: Vec<StageHealth>,
    pub total_deals: i64,
    pub total_value: f64,
    pub stale_deals: i64,
    pub stale_after_days: u32,
}

impl PipelineHealth {
    /// Closed stages never count as stale.
    pub fn from_aggregates(rows: Vec<StageAggregate>, stale_after_days: u32) -> Self {
        let total_value: f64 = rows.iter().map(|r| r.total_value).sum();
        let total_deals: i64 = rows.iter().map(|r| r.deal_count).sum();
        let stages: Vec<StageHealth> = rows
            .into_iter()
            .map(|r| {
                let share_of_value = if total_value > 0.0 {
                    round2(r.total_value / total_value * 100.0)
                } else {
                    0.0
                };
                let stale_deals = if is_closed_stage(&r.code) { 0 } else { r.stale_deals };
                StageHealth {
                    stage_id: r.stage_id,
                    code: r.code,
                    name: r.name,
                    order: r.order,
                    deal_count: r.deal_count,
                    total_value: round2(r.total_value),
                    average_days_in_stage: round2(r.average_days_in_stage.unwrap_or(0.0)),
                    stale_deals,
                    share_of_value,
                }
            })
            .collect();
        let stale_deals = stages.iter().map(|s| s.stale_deals).sum();
        PipelineHealth {
            stages,
            total_deals,
            total_value: round2(total_value),
            stale_deals,
            stale_after_days,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCount {
    pub week_start: NaiveDate,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_contacts: i64,
    pub total_companies: i64,
    pub total_deals: i64,
    pub open_deals: i64,
    pub pipeline_value: f64,
    pub won_value: f64,
    pub activities_this_week: i64,
    pub weekly_deals: Vec<WeeklyCount>,
}

/// Monday of the week containing `day`.
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

/// Starts of the last `weeks` weeks ending with the week of `today`, oldest first.
pub fn week_starts(today: NaiveDate, weeks: u32) -> Vec<NaiveDate> {
    let current = week_start(today);
    (0..weeks as i64)
        .rev()
        .map(|i| current - Duration::weeks(i))
        .collect()
}

/// Zero-fill counts onto the given week starts; counts outside the window are dropped.
pub fn fill_weeks(starts: &[NaiveDate], counts: &[(NaiveDate, i64)]) -> Vec<WeeklyCount> {
    starts
        .iter()
        .map(|w| WeeklyCount {
            week_start: *w,
            count: counts
                .iter()
                .filter(|(d, _)| d == w)
                .map(|(_, c)| *c)
                .sum(),
        })
        .collect()
}

struct Tables {
    deals: String,
    stages: String,
    contacts: String,
    companies: String,
    activities: String,
}

fn tables(model: &ResolvedModel) -> Result<Tables, AppError> {
    let table = |path: &str| {
        model
            .entity_by_path(path)
            .map(qualified_table)
            .ok_or_else(|| {
                AppError::Config(ConfigError::MissingReference {
                    kind: "entity",
                    id: path.to_string(),
                })
            })
    };
    Ok(Tables {
        deals: table("deals")?,
        stages: table("pipeline-stages")?,
        contacts: table("contacts")?,
        companies: table("companies")?,
        activities: table("activities")?,
    })
}

/// WHERE fragment for `ReportFilter`, bound as $1 start, $2 end, $3 owner.
const FILTER_SQL: &str = "($1::date IS NULL OR d.stage_entered_at >= $1::date) \
     AND ($2::date IS NULL OR d.stage_entered_at < $2::date + 1) \
     AND ($3::uuid IS NULL OR d.owner_user_id = $3::uuid)";

pub async fn close_rate(pool: &PgPool, model: &ResolvedModel, filter: &ReportFilter) -> Result<CloseRate, AppError> {
    let t = tables(model)?;
    let sql = format!(
        "SELECT COUNT(*) FILTER (WHERE s.code = $4), COUNT(*) FILTER (WHERE s.code = $5) \
         FROM {} d JOIN {} s ON s.id = d.pipeline_stage WHERE {}",
        t.deals, t.stages, FILTER_SQL
    );
    let (won, lost): (i64, i64) = sqlx::query_as(&sql)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.owner_user_id)
        .bind(WON_STAGE)
        .bind(LOST_STAGE)
        .fetch_one(pool)
        .await?;
    Ok(CloseRate::from_counts(won, lost))
}

pub async fn acv(pool: &PgPool, model: &ResolvedModel, filter: &ReportFilter) -> Result<Acv, AppError> {
    let t = tables(model)?;
    let sql = format!(
        "SELECT COALESCE(AVG(d.amount), 0)::float8, COALESCE(SUM(d.amount), 0)::float8, COUNT(*) \
         FROM {} d JOIN {} s ON s.id = d.pipeline_stage WHERE s.code = $4 AND {}",
        t.deals, t.stages, FILTER_SQL
    );
    let (avg, total, count): (f64, f64, i64) = sqlx::query_as(&sql)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.owner_user_id)
        .bind(WON_STAGE)
        .fetch_one(pool)
        .await?;
    Ok(Acv {
        acv: round2(avg),
        total_value: round2(total),
        won_deals: count,
    })
}

pub async fn sales_cycle(pool: &PgPool, model: &ResolvedModel, filter: &ReportFilter) -> Result<SalesCycle, AppError> {
    let t = tables(model)?;
    let sql = format!(
        "SELECT COUNT(*), AVG(days), percentile_cont(0.5) WITHIN GROUP (ORDER BY days), MIN(days), MAX(days) \
         FROM (SELECT GREATEST(0, EXTRACT(EPOCH FROM (d.stage_entered_at - d.created_at)) / 86400.0)::float8 AS days \
               FROM {} d JOIN {} s ON s.id = d.pipeline_stage \
               WHERE s.code = $4 AND d.stage_entered_at IS NOT NULL AND {}) cycle",
        t.deals, t.stages, FILTER_SQL
    );
    let (count, avg, median, min, max): (i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
        sqlx::query_as(&sql)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.owner_user_id)
            .bind(WON_STAGE)
            .fetch_one(pool)
            .await?;
    Ok(SalesCycle {
        average_days: round2(avg.unwrap_or(0.0)),
        median_days: round2(median.unwrap_or(0.0)),
        min_days: round2(min.unwrap_or(0.0)),
        max_days: round2(max.unwrap_or(0.0)),
        deal_count: count,
    })
}

type StageRow = (Uuid, String, String, i32, i64, f64, Option<f64>, i64);

pub async fn pipeline_health(pool: &PgPool, model: &ResolvedModel, stale_after_days: u32) -> Result<PipelineHealth, AppError> {
    let t = tables(model)?;
    let sql = format!(
        "SELECT s.id, s.code, s.name, s.display_order, COUNT(d.id), COALESCE(SUM(d.amount), 0)::float8, \
                AVG(EXTRACT(EPOCH FROM (NOW() - d.stage_entered_at)) / 86400.0)::float8, \
                COUNT(d.id) FILTER (WHERE d.stage_entered_at < NOW() - make_interval(days => $1)) \
         FROM {} s LEFT JOIN {} d ON d.pipeline_stage = s.id \
         GROUP BY s.id, s.code, s.name, s.display_order \
         ORDER BY s.display_order, s.name",
        t.stages, t.deals
    );
    let days = i32::try_from(stale_after_days).unwrap_or(i32::MAX);
    let rows: Vec<StageRow> = sqlx::query_as(&sql).bind(days).fetch_all(pool).await?;
    let aggregates = rows
        .into_iter()
        .map(|(stage_id, code, name, order, deal_count, total_value, avg_days, stale)| StageAggregate {
            stage_id,
            code,
            name,
            order,
            deal_count,
            total_value,
            average_days_in_stage: avg_days,
            stale_deals: stale,
        })
        .collect();
    Ok(PipelineHealth::from_aggregates(aggregates, stale_after_days))
}

pub async fn metrics(pool: &PgPool, model: &ResolvedModel, weeks: u32, today: NaiveDate) -> Result<Metrics, AppError> {
    let t = tables(model)?;
    let open = "(s.code IS NULL OR s.code NOT IN ($1, $2))";
    let sql = format!(
        "SELECT \
           (SELECT COUNT(*) FROM {contacts}), \
           (SELECT COUNT(*) FROM {companies}), \
           (SELECT COUNT(*) FROM {deals}), \
           (SELECT COUNT(*) FROM {deals} d LEFT JOIN {stages} s ON s.id = d.pipeline_stage WHERE {open}), \
           (SELECT COALESCE(SUM(d.amount), 0)::float8 FROM {deals} d LEFT JOIN {stages} s ON s.id = d.pipeline_stage WHERE {open}), \
           (SELECT COALESCE(SUM(d.amount), 0)::float8 FROM {deals} d JOIN {stages} s ON s.id = d.pipeline_stage WHERE s.code = $1), \
           (SELECT COUNT(*) FROM {activities} WHERE occurred_at >= $3::date)",
        contacts = t.contacts,
        companies = t.companies,
        deals = t.deals,
        stages = t.stages,
        activities = t.activities,
        open = open,
    );
    let this_week = week_start(today);
    let (contacts, companies, deals, open_deals, pipeline_value, won_value, activities): (i64, i64, i64, i64, f64, f64, i64) =
        sqlx::query_as(&sql)
            .bind(WON_STAGE)
            .bind(LOST_STAGE)
            .bind(this_week)
            .fetch_one(pool)
            .await?;

    let starts = week_starts(today, weeks);
    let first = starts.first().copied().unwrap_or(this_week);
    let weekly_sql = format!(
        "SELECT (date_trunc('week', created_at AT TIME ZONE 'UTC'))::date, COUNT(*) \
         FROM {} WHERE created_at >= $1::date GROUP BY 1",
        t.deals
    );
    let counts: Vec<(NaiveDate, i64)> = sqlx::query_as(&weekly_sql).bind(first).fetch_all(pool).await?;

    Ok(Metrics {
        total_contacts: contacts,
        total_companies: companies,
        total_deals: deals,
        open_deals,
        pipeline_value: round2(pipeline_value),
        won_value: round2(won_value),
        activities_this_week: activities,
        weekly_deals: fill_weeks(&starts, &counts),
    })
}
