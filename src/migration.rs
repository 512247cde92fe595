//! Apply the entity model to the database: schema, tables with inline foreign keys, indexes.
//! Tables are created in model order, so referenced tables exist first. Every statement is idempotent.

use crate::config::{ColumnInfo, ResolvedEntity, ResolvedModel, PK_COLUMN};
use crate::error::AppError;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

fn column_ddl(entity: &ResolvedEntity, c: &ColumnInfo) -> String {
    let mut def = format!("{} {}", quoted(&c.name), c.pg_type.to_uppercase());
    if c.name == PK_COLUMN {
        def.push_str(" PRIMARY KEY");
    } else if !c.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    if c.unique {
        def.push_str(" UNIQUE");
    }
    if let Some((table, on_delete)) = &c.references {
        def.push_str(&format!(
            " REFERENCES {}.{} ({}) ON DELETE {}",
            quoted(&entity.schema_name),
            quoted(table),
            quoted(PK_COLUMN),
            on_delete
        ));
    }
    def
}

/// CREATE TABLE IF NOT EXISTS for one entity.
pub fn table_ddl(entity: &ResolvedEntity) -> String {
    let cols: Vec<String> = entity.columns.iter().map(|c| column_ddl(entity, c)).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(entity),
        cols.join(",\n  ")
    )
}

/// CREATE INDEX IF NOT EXISTS for each configured index.
pub fn index_ddl(entity: &ResolvedEntity) -> Vec<String> {
    entity
        .indexes
        .iter()
        .map(|idx| {
            let cols: Vec<String> = idx.columns.iter().map(|c| quoted(c)).collect();
            format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                if idx.unique { "UNIQUE " } else { "" },
                quoted(&idx.name),
                qualified_table(entity),
                cols.join(", ")
            )
        })
        .collect()
}

pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    // gen_random_uuid() is built in from PostgreSQL 13; older servers need pgcrypto.
    if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS pgcrypto").execute(pool).await {
        tracing::warn!(error = %e, "could not ensure pgcrypto extension");
    }

    let mut schemas: Vec<&str> = model.entities.iter().map(|e| e.schema_name.as_str()).collect();
    schemas.dedup();
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
            .execute(pool)
            .await?;
    }

    for entity in &model.entities {
        sqlx::query(&table_ddl(entity)).execute(pool).await?;
        for sql in index_ddl(entity) {
            sqlx::query(&sql).execute(pool).await?;
        }
        tracing::debug!(table = %entity.table_name, "table ensured");
    }
    tracing::info!(tables = model.entities.len(), "migrations applied");
    Ok(())
}
