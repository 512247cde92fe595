//! Typed errors and HTTP mapping. Every error renders as `{ "error": "<message>" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotImplemented(String),
    /// Extractor rejection passed through with its own status (413, 415).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// SQLSTATEs caused by the request's own data, answered with 400 and a fixed message.
fn client_error_message(code: &str) -> Option<&'static str> {
    match code {
        "23505" => Some("A record with the same unique value already exists"),
        "23503" => Some("Referenced record does not exist or is still in use"),
        "23502" => Some("A required field is missing"),
        "22P02" | "22007" | "22008" => Some("A field has an invalid value"),
        "22003" => Some("A numeric field is out of range"),
        _ => None,
    }
}

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Rejected { status, .. } => *status,
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
                _ if db_client_error(e).is_some() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message returned to clients. Internal failures are logged and replaced by a generic message.
    fn public_message(&self) -> String {
        match self {
            AppError::Db(sqlx::Error::RowNotFound) => "Not found".into(),
            AppError::Db(e) => match db_client_error(e) {
                Some(message) => message.into(),
                None => "Internal server error".into(),
            },
            AppError::Config(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

fn db_client_error(e: &sqlx::Error) -> Option<&'static str> {
    e.as_database_error()
        .and_then(|d| d.code())
        .and_then(|c| client_error_message(&c))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        assert_eq!(AppError::Validation("name is required".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unauthorized().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("Contact not found".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NotImplemented("csv".into()).status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(AppError::Db(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Db(sqlx::Error::PoolTimedOut).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_input_sqlstates_are_client_errors() {
        for code in ["22P02", "22007", "22008", "22003", "23502", "23503", "23505"] {
            assert!(client_error_message(code).is_some(), "{}", code);
        }
        assert_eq!(client_error_message("22003"), Some("A numeric field is out of range"));
        assert_eq!(client_error_message("40001"), None);
        assert_eq!(client_error_message("42P01"), None);
    }

    #[test]
    fn hides_internal_details() {
        assert_eq!(AppError::Db(sqlx::Error::PoolTimedOut).public_message(), "Internal server error");
        assert_eq!(AppError::BadRequest("Invalid contact ID format".into()).public_message(), "Invalid contact ID format");
    }
}
