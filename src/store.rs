//! Database bootstrap: create the target database when missing and seed default pipeline stages.

use crate::config::ResolvedModel;
use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, quoted};
use crate::service::reports::{LOST_STAGE, WON_STAGE};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// A stage created on first start.
pub struct DefaultStage {
    pub code: &'static str,
    pub name: &'static str,
    pub probability: i32,
    pub color: &'static str,
    pub is_system: bool,
}

/// Seeded in this order; `display_order` is the 1-based position.
pub const DEFAULT_STAGES: &[DefaultStage] = &[
    DefaultStage { code: "lead", name: "Lead", probability: 10, color: "#94a3b8", is_system: false },
    DefaultStage { code: "qualified", name: "Qualified", probability: 25, color: "#60a5fa", is_system: false },
    DefaultStage { code: "proposal", name: "Proposal", probability: 50, color: "#a78bfa", is_system: false },
    DefaultStage { code: "negotiation", name: "Negotiation", probability: 75, color: "#f59e0b", is_system: false },
    DefaultStage { code: WON_STAGE, name: "Closed Won", probability: 100, color: "#22c55e", is_system: true },
    DefaultStage { code: LOST_STAGE, name: "Closed Lost", probability: 0, color: "#ef4444", is_system: true },
];

/// Insert `DEFAULT_STAGES` when the stage table is empty. Returns how many were inserted.
pub async fn seed_pipeline_stages(pool: &PgPool, model: &ResolvedModel) -> Result<usize, AppError> {
    let stages = model.entity_by_path("pipeline-stages").ok_or_else(|| {
        AppError::Config(ConfigError::MissingReference {
            kind: "entity",
            id: "pipeline-stages".into(),
        })
    })?;
    let table = qualified_table(stages);

    let mut tx = pool.begin().await?;
    let existing: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }
    let sql = format!(
        "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES ($1, $2, $3, $4, $5, $6)",
        table,
        quoted("code"),
        quoted("name"),
        quoted("display_order"),
        quoted("probability"),
        quoted("color"),
        quoted("is_system")
    );
    for (i, stage) in DEFAULT_STAGES.iter().enumerate() {
        sqlx::query(&sql)
            .bind(stage.code)
            .bind(stage.name)
            .bind(i as i32 + 1)
            .bind(stage.probability)
            .bind(stage.color)
            .bind(stage.is_system)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    tracing::info!(count = DEFAULT_STAGES.len(), "seeded default pipeline stages");
    Ok(DEFAULT_STAGES.len())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Validation(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

/// Split a connection URL into the admin (`postgres` database) URL and the target database name.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url[scheme_end..]
        .find('/')
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| ConfigError::Validation("DATABASE_URL: no database name".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((name, q)) => (name.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_url() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/crm").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "crm");

        let (admin, db) = parse_db_name_from_url("postgres://localhost/crm?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://localhost/postgres?sslmode=disable");
        assert_eq!(db, "crm");

        assert!(parse_db_name_from_url("postgres://localhost").is_err());
    }

    #[test]
    fn closed_stages_are_system_stages() {
        let system: Vec<&str> = DEFAULT_STAGES.iter().filter(|s| s.is_system).map(|s| s.code).collect();
        assert_eq!(system, vec![WON_STAGE, LOST_STAGE]);
        assert_eq!(DEFAULT_STAGES.first().map(|s| s.code), Some("lead"));
    }
}
