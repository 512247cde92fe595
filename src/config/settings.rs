//! Runtime settings from environment variables (`.env` is loaded by the binary via dotenvy).

use crate::error::ConfigError;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// PostgreSQL schema holding the CRM tables. Must be a valid identifier.
    pub schema: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub default_page_size: u32,
    pub stale_deal_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/crm".into(),
            schema: "crm".into(),
            bind_addr: "0.0.0.0:3000".into(),
            max_connections: 5,
            default_page_size: 20,
            stale_deal_days: 30,
        }
    }
}

impl Settings {
    /// Read `DATABASE_URL`, `CRM_SCHEMA`, `BIND_ADDR`, `DB_MAX_CONNECTIONS`, `DEFAULT_PAGE_SIZE`, `STALE_DEAL_DAYS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let schema = lookup("CRM_SCHEMA").unwrap_or(defaults.schema);
        if !is_identifier(&schema) {
            return Err(ConfigError::Validation(format!(
                "CRM_SCHEMA must be a lowercase identifier, got '{}'",
                schema
            )));
        }
        let default_page_size = parse_or(&lookup, "DEFAULT_PAGE_SIZE", defaults.default_page_size)?;
        if default_page_size == 0 || default_page_size > crate::handlers::common::MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "DEFAULT_PAGE_SIZE must be between 1 and {}",
                crate::handlers::common::MAX_PAGE_SIZE
            )));
        }
        Ok(Settings {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            schema,
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            default_page_size,
            stale_deal_days: parse_or(&lookup, "STALE_DEAL_DAYS", defaults.stale_deal_days)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Validation(format!("{} is not a valid number: '{}'", key, raw))),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.schema, "crm");
        assert_eq!(s.default_page_size, 20);
        assert_eq!(s.stale_deal_days, 30);
    }

    #[test]
    fn reads_overrides() {
        let s = Settings::from_lookup(lookup(&[("CRM_SCHEMA", "sales"), ("DB_MAX_CONNECTIONS", "12")])).unwrap();
        assert_eq!(s.schema, "sales");
        assert_eq!(s.max_connections, 12);
    }

    #[test]
    fn rejects_bad_schema_and_numbers() {
        assert!(Settings::from_lookup(lookup(&[("CRM_SCHEMA", "crm; drop")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("STALE_DEAL_DAYS", "soon")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DEFAULT_PAGE_SIZE", "0")])).is_err());
    }
}
