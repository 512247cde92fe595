//! Model config validation: referential integrity and API consistency.

use crate::config::loader::AUDIT_COLUMNS;
use crate::config::resolved::PK_COLUMN;
use crate::config::ModelConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &ModelConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }

    let mut path_segments = HashSet::new();
    let mut tables = HashSet::new();

    for e in &config.entities {
        if !path_segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
        }

        let mut columns: HashSet<&str> = HashSet::new();
        columns.insert(PK_COLUMN);
        for (name, ..) in AUDIT_COLUMNS {
            columns.insert(*name);
        }
        for c in &e.columns {
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "table {}: duplicate column {}",
                    e.table, c.name
                )));
            }
            if let Some(r) = &c.references {
                // References must point at a table declared earlier so DDL runs in order.
                if !tables.contains(r.table.as_str()) && r.table != e.table {
                    return Err(ConfigError::MissingReference {
                        kind: "table",
                        id: r.table.clone(),
                    });
                }
            }
        }

        let listed = e
            .search
            .iter()
            .chain(e.sortable.iter())
            .chain(e.filters.iter())
            .chain(e.default_sort.iter().map(|s| &s.column))
            .chain(e.validation.keys())
            .chain(e.indexes.iter().flat_map(|i| i.columns.iter()));
        for col in listed {
            if !columns.contains(col.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.table, col),
                });
            }
        }

        tables.insert(e.table.as_str());
    }

    Ok(())
}
