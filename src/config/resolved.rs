//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::ValidationRule;
use regex::Regex;
use std::collections::HashMap;

/// Primary key column shared by every CRM table.
pub const PK_COLUMN: &str = "id";

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// camelCase field name used in request and response bodies.
    pub api_name: String,
    /// PostgreSQL type name used for DDL and parameter casts (e.g. "uuid", "numeric(14,2)").
    pub pg_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub references: Option<(String, String)>,
    pub writable: bool,
    pub sensitive: bool,
    pub unique: bool,
}

impl ColumnInfo {
    pub fn is_uuid(&self) -> bool {
        self.pg_type == "uuid"
    }

    pub fn is_numeric(&self) -> bool {
        self.pg_type.starts_with("numeric")
    }

    /// Cast placeholder `$n` to the column type so text-encoded parameters bind.
    pub fn placeholder(&self, n: u32) -> String {
        format!("${}::{}", n, self.pg_type)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub label: String,
    pub columns: Vec<ColumnInfo>,
    pub search_columns: Vec<String>,
    pub sortable: Vec<String>,
    pub default_sort: Vec<(String, SortOrder)>,
    pub filters: Vec<String>,
    pub indexes: Vec<IndexInfo>,
    /// Keyed by column name.
    pub validation: HashMap<String, ValidationRule>,
    /// `pattern` rules compiled at load, keyed by column name.
    pub patterns: HashMap<String, Regex>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_by_api_name(&self, api_name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.api_name == api_name)
    }

    /// "contact" -> "Contact", used at the start of user-facing messages.
    pub fn title(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
