//! Load the CRM entity model from the bundled JSON config and resolve it for runtime use.

use crate::case::to_camel_case;
use crate::config::resolved::{ColumnInfo, IndexInfo, ResolvedEntity, ResolvedModel, SortOrder, PK_COLUMN};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;

const CRM_MODEL_JSON: &str = include_str!("crm_model.json");

/// Columns every table carries in addition to its configured ones.
/// (name, pg type, nullable, default)
pub const AUDIT_COLUMNS: &[(&str, &str, bool, Option<&str>)] = &[
    ("created_at", "timestamptz", false, Some("NOW()")),
    ("updated_at", "timestamptz", false, Some("NOW()")),
    ("created_by", "uuid", true, None),
    ("updated_by", "uuid", true, None),
];

/// Parse the bundled model config.
pub fn bundled_config() -> Result<ModelConfig, ConfigError> {
    serde_json::from_str(CRM_MODEL_JSON).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Parse, validate and resolve the bundled model into `schema`.
pub fn load_model(schema: &str) -> Result<ResolvedModel, ConfigError> {
    let config = bundled_config()?;
    resolve(&config, schema)
}

/// Compile every `pattern` rule of an entity once; a bad pattern is a config error.
fn compile_patterns(e: &EntityConfig) -> Result<HashMap<String, Regex>, ConfigError> {
    let mut out = HashMap::new();
    for (col, rule) in &e.validation {
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|err| ConfigError::Validation(format!("{}.{}: invalid pattern: {}", e.table, col, err)))?;
            out.insert(col.clone(), re);
        }
    }
    Ok(out)
}

/// Build resolved model from config (validates first).
pub fn resolve(config: &ModelConfig, schema: &str) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut entity_by_path = HashMap::new();

    for e in &config.entities {
        let mut columns = Vec::with_capacity(e.columns.len() + AUDIT_COLUMNS.len() + 1);
        columns.push(ColumnInfo {
            name: PK_COLUMN.to_string(),
            api_name: PK_COLUMN.to_string(),
            pg_type: "uuid".into(),
            nullable: false,
            default: Some("gen_random_uuid()".into()),
            references: None,
            writable: false,
            sensitive: false,
            unique: false,
        });
        for c in &e.columns {
            columns.push(ColumnInfo {
                name: c.name.clone(),
                api_name: c.api_name.clone().unwrap_or_else(|| to_camel_case(&c.name)),
                pg_type: c.type_.to_lowercase(),
                nullable: c.nullable,
                default: c.default.clone(),
                references: c.references.as_ref().map(|r| {
                    (r.table.clone(), r.on_delete.clone().unwrap_or_else(|| "NO ACTION".into()))
                }),
                writable: !c.read_only,
                sensitive: c.sensitive,
                unique: c.unique,
            });
        }
        for (name, pg_type, nullable, default) in AUDIT_COLUMNS {
            columns.push(ColumnInfo {
                name: (*name).to_string(),
                api_name: to_camel_case(name),
                pg_type: (*pg_type).to_string(),
                nullable: *nullable,
                default: default.map(str::to_string),
                references: None,
                writable: false,
                sensitive: false,
                unique: false,
            });
        }

        let default_sort = if e.default_sort.is_empty() {
            vec![("created_at".to_string(), SortOrder::Desc)]
        } else {
            e.default_sort
                .iter()
                .map(|s| {
                    let order = if s.descending { SortOrder::Desc } else { SortOrder::Asc };
                    (s.column.clone(), order)
                })
                .collect()
        };

        let entity = ResolvedEntity {
            schema_name: schema.to_string(),
            table_name: e.table.clone(),
            path_segment: e.path_segment.clone(),
            label: e.label.clone(),
            columns,
            search_columns: e.search.clone(),
            sortable: e.sortable.clone(),
            default_sort,
            filters: e.filters.clone(),
            indexes: e
                .indexes
                .iter()
                .map(|i| IndexInfo {
                    name: i.name.clone(),
                    columns: i.columns.clone(),
                    unique: i.unique,
                })
                .collect(),
            validation: e.validation.clone(),
            patterns: compile_patterns(e)?,
        };
        entity_by_path.insert(e.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}
