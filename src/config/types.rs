//! Raw model config types matching `crm_model.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub table: String,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// SQL default expression (e.g. `NOW()`, `true`).
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub references: Option<ReferenceConfig>,
    /// API field name when it is not the camelCase form of `name`.
    #[serde(default)]
    pub api_name: Option<String>,
    /// Set by the server only; ignored in request bodies.
    #[serde(default)]
    pub read_only: bool,
    /// Never exposed in API responses (secrets, hashes).
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub unique: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortConfig {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub table: String,
    pub path_segment: String,
    /// Singular human name used in messages ("contact", "pipeline stage").
    pub label: String,
    pub columns: Vec<ColumnConfig>,
    /// Columns matched case-insensitively by `?search=`.
    #[serde(default)]
    pub search: Vec<String>,
    /// Columns accepted by `?sortBy=`.
    #[serde(default)]
    pub sortable: Vec<String>,
    #[serde(default)]
    pub default_sort: Vec<SortConfig>,
    /// Columns accepted as equality filters in the query string (by API name).
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
}

/// All entity configs in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub entities: Vec<EntityConfig>,
}
