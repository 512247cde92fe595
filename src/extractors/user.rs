//! Extract the authenticated user id supplied by the host (X-User-Id header).

use crate::error::AppError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header the host's auth layer sets to the signed-in user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Optional session user. A missing or malformed header means anonymous.
#[derive(Clone, Copy, Debug)]
pub struct SessionUser(pub Option<Uuid>);

impl SessionUser {
    /// The user id, or 401 for anonymous callers.
    pub fn require(&self) -> Result<Uuid, AppError> {
        self.0.ok_or_else(AppError::unauthorized)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .and_then(|s| Uuid::parse_str(s).ok());
        Ok(SessionUser(user))
    }
}
