//! Request validation from the entity's per-column rules and column types. Messages use API field names.

use crate::config::{ColumnInfo, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

const UUID_PATTERN: &str = r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

/// Canonical hyphenated UUID (the simple and braced forms `Uuid::parse_str` accepts are rejected).
pub fn is_canonical_uuid(s: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(UUID_PATTERN).ok())
        .as_ref()
        .map_or(false, |re| re.is_match(s))
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body (column-keyed). All required fields must be present and non-blank.
    pub fn validate(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<(), AppError> {
        check_types(entity, body)?;
        for (col, rule) in &entity.validation {
            let field = field_name(entity, col);
            let val = body.get(col);
            if rule.required == Some(true) && val.map_or(true, is_blank) {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(&field, v, rule, entity.patterns.get(col))?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PUT). A present required field may not be blanked.
    pub fn validate_partial(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<(), AppError> {
        check_types(entity, body)?;
        for (col, v) in body {
            if let Some(rule) = entity.validation.get(col) {
                let field = field_name(entity, col);
                if rule.required == Some(true) && is_blank(v) {
                    return Err(AppError::Validation(format!("{} cannot be empty", field)));
                }
                validate_field(&field, v, rule, entity.patterns.get(col))?;
            }
        }
        Ok(())
    }
}

fn check_types(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<(), AppError> {
    for (col, v) in body {
        if let Some(info) = entity.column(col) {
            check_type(info, v)?;
        }
    }
    Ok(())
}

/// Reject values the column's parameter cast would fail on. Null is left to the rules above.
fn check_type(col: &ColumnInfo, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    let expected = |what: &str| AppError::Validation(format!("{} must be {}", col.api_name, what));
    let ok = match col.pg_type.as_str() {
        "integer" => v.as_i64().map_or(false, |n| i32::try_from(n).is_ok()),
        "boolean" => v.is_boolean(),
        "uuid" => v.as_str().map_or(false, is_canonical_uuid),
        "date" => v
            .as_str()
            .map_or(false, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        "timestamptz" => v.as_str().map_or(false, |s| DateTime::parse_from_rfc3339(s).is_ok()),
        t if t.starts_with("numeric") => return check_numeric(col, t, v),
        _ => true,
    };
    if ok {
        return Ok(());
    }
    Err(match col.pg_type.as_str() {
        "integer" => expected("an integer"),
        "boolean" => expected("true or false"),
        "uuid" => expected("a valid UUID"),
        "date" => expected("a date (YYYY-MM-DD)"),
        _ => expected("an RFC 3339 timestamp"),
    })
}

/// `numeric(p,s)`: a JSON number whose rounded value has at most `p - s` integer digits.
fn check_numeric(col: &ColumnInfo, pg_type: &str, v: &Value) -> Result<(), AppError> {
    let n = v
        .as_f64()
        .filter(|n| n.is_finite())
    .ok_or_else(|| AppError::Validation(format!("{} must be a number", col.api_name)))?;
    if let Some((precision, scale)) = numeric_precision(pg_type) {
        let factor = 10f64.powi(scale);
        let limit = 10f64.powi(precision - scale);
        if (n.abs() * factor).round() / factor >= limit {
            return Err(AppError::Validation(format!("{} is out of range", col.api_name)));
        }
    }
    Ok(())
}

/// "numeric(14,2)" -> (14, 2); plain "numeric" is unbounded.
fn numeric_precision(pg_type: &str) -> Option<(i32, i32)> {
    let args = pg_type.strip_prefix("numeric(")?.strip_suffix(')')?;
    let mut parts = args.split(',').map(|p| p.trim().parse::<i32>());
    let precision = parts.next()?.ok()?;
    let scale = match parts.next() {
        Some(s) => s.ok()?,
        None => 0,
    };
    Some((precision, scale))
}

fn field_name(entity: &ResolvedEntity, col: &str) -> String {
    entity
        .column(col)
        .map(|c| c.api_name.clone())
        .unwrap_or_else(|| col.to_string())
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(field, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    field, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    field, min
                )));
            }
        }
    }
    if let Some(re) = pattern {
        match v.as_str() {
            Some(s) if re.is_match(s) => {}
            _ => {
                return Err(AppError::Validation(format!("{} has an invalid format", field)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let options: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string()))
                .collect();
            return Err(AppError::Validation(format!(
                "{} must be one of: {}",
                field,
                options.join(", ")
            )));
        }
    }
    if rule.minimum.is_some() || rule.maximum.is_some() {
        let n = v
            .as_f64()
            .ok_or_else(|| AppError::Validation(format!("{} must be a number", field)))?;
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", field, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", field, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else {
        return Err(AppError::Validation(format!("{} must be a string", field)));
    };
    match format.to_lowercase().as_str() {
        "email" => {
            let at = s.find('@');
            if !matches!(at, Some(i) if i > 0 && i + 1 < s.len()) {
                return Err(AppError::Validation(format!("{} must be a valid email", field)));
            }
        }
        "uuid" => {
            if !is_canonical_uuid(s) {
                return Err(AppError::Validation(format!("{} must be a valid UUID", field)));
            }
        }
        "date" => {
            if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                return Err(AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", field)));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_model;
    use serde_json::json;

    fn body(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn missing_or_blank_name_is_rejected() {
        let model = load_model("crm").unwrap();
        let contacts = model.entity_by_path("contacts").unwrap();
        let err = RequestValidator::validate(contacts, &body(&[("email", json!("a@b.co"))])).unwrap_err();
        assert_eq!(err.to_string(), "name is required");
        assert!(RequestValidator::validate(contacts, &body(&[("name", json!("   "))])).is_err());
        assert!(RequestValidator::validate(contacts, &body(&[("name", json!("Ann"))])).is_ok());
    }

    #[test]
    fn formats_are_checked_with_api_names() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let err = RequestValidator::validate(
            deals,
            &body(&[("name", json!("Big")), ("company_id", json!("nope"))]),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "companyId must be a valid UUID");
        let err = RequestValidator::validate_partial(deals, &body(&[("amount", json!(-5))])).unwrap_err();
        assert_eq!(err.to_string(), "amount must be at least 0");
        assert!(RequestValidator::validate_partial(deals, &body(&[("close_date_estimate", json!("2025-13-01"))])).is_err());
    }

    #[test]
    fn partial_update_cannot_blank_required_field() {
        let model = load_model("crm").unwrap();
        let companies = model.entity_by_path("companies").unwrap();
        assert!(RequestValidator::validate_partial(companies, &body(&[("name", json!(""))])).is_err());
        assert!(RequestValidator::validate_partial(companies, &body(&[("industry", Value::Null)])).is_ok());
    }

    fn rejects(entity: &ResolvedEntity, col: &str, v: Value) -> String {
        RequestValidator::validate_partial(entity, &body(&[(col, v)]))
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn integer_columns_need_whole_numbers_in_range() {
        let model = load_model("crm").unwrap();
        let stages = model.entity_by_path("pipeline-stages").unwrap();
        assert_eq!(rejects(stages, "probability", json!(50.5)), "probability must be an integer");
        assert_eq!(rejects(stages, "display_order", json!(2.5)), "order must be an integer");
        assert_eq!(rejects(stages, "display_order", json!("3")), "order must be an integer");
        assert_eq!(rejects(stages, "display_order", json!(3_000_000_000u64)), "order must be an integer");
        assert!(RequestValidator::validate_partial(stages, &body(&[("display_order", json!(3))])).is_ok());
    }

    #[test]
    fn boolean_columns_need_json_bools() {
        let model = load_model("crm").unwrap();
        let activities = model.entity_by_path("activities").unwrap();
        assert_eq!(rejects(activities, "completed", json!("maybe")), "completed must be true or false");
        let hooks = model.entity_by_path("webhooks").unwrap();
        assert_eq!(rejects(hooks, "is_active", json!("nah")), "isActive must be true or false");
        assert!(RequestValidator::validate_partial(hooks, &body(&[("is_active", json!(false))])).is_ok());
    }

    #[test]
    fn timestamp_columns_need_rfc3339() {
        let model = load_model("crm").unwrap();
        let activities = model.entity_by_path("activities").unwrap();
        assert_eq!(
            rejects(activities, "occurred_at", json!("garbage")),
            "occurredAt must be an RFC 3339 timestamp"
        );
        assert_eq!(
            rejects(activities, "occurred_at", json!(1700000000)),
            "occurredAt must be an RFC 3339 timestamp"
        );
        assert!(RequestValidator::validate_partial(
            activities,
            &body(&[("occurred_at", json!("2026-10-16T09:30:00+02:00"))])
        )
        .is_ok());
    }

    #[test]
    fn numeric_columns_respect_precision() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        assert_eq!(rejects(deals, "amount", json!(1e20)), "amount is out of range");
        assert_eq!(rejects(deals, "amount", json!(1_000_000_000_000u64)), "amount is out of range");
        assert_eq!(rejects(deals, "amount", json!("lots")), "amount must be a number");
        assert!(RequestValidator::validate_partial(deals, &body(&[("amount", json!(999_999_999_999.99))])).is_ok());
        assert_eq!(numeric_precision("numeric(14,2)"), Some((14, 2)));
        assert_eq!(numeric_precision("numeric"), None);
    }

    #[test]
    fn uuid_and_date_columns_use_canonical_forms() {
        let model = load_model("crm").unwrap();
        let deals = model.entity_by_path("deals").unwrap();
        let braced = "{2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11}";
        assert_eq!(rejects(deals, "company_id", json!(braced)), "companyId must be a valid UUID");
        assert_eq!(
            rejects(deals, "company_id", json!("2d1f3c9e3c554a0e9c596b6f0b0f6d11")),
            "companyId must be a valid UUID"
        );
        assert_eq!(
            rejects(deals, "close_date_estimate", json!("16/10/2026")),
            "closeDateEstimate must be a date (YYYY-MM-DD)"
        );
        assert!(is_canonical_uuid("2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11"));
    }

    #[test]
    fn patterns_come_from_the_resolved_model() {
        let model = load_model("crm").unwrap();
        let stages = model.entity_by_path("pipeline-stages").unwrap();
        assert_eq!(rejects(stages, "code", json!("Closed Won")), "code has an invalid format");
        let hooks = model.entity_by_path("webhooks").unwrap();
        assert_eq!(rejects(hooks, "url", json!("ftp://x")), "url has an invalid format");
    }

    #[test]
    fn allowed_values_listed_in_message() {
        let model = load_model("crm").unwrap();
        let activities = model.entity_by_path("activities").unwrap();
        let err = RequestValidator::validate(
            activities,
            &body(&[("activity_type", json!("fax")), ("subject", json!("hi"))]),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "type must be one of: call, email, meeting, note, task");
    }
}
