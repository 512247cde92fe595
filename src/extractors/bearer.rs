//! `Authorization: Bearer <token>` extractor.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Bearer token if the header is present and well formed.
#[derive(Clone, Debug)]
pub struct BearerToken(pub Option<String>);

/// Token part of an `Authorization` value; the scheme is case-insensitive.
pub(crate) fn parse_bearer(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer);
        Ok(BearerToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bearer;

    #[test]
    fn parses_bearer_values() {
        assert_eq!(parse_bearer("Bearer crm_abc").as_deref(), Some("crm_abc"));
        assert_eq!(parse_bearer("bearer  crm_abc ").as_deref(), Some("crm_abc"));
        assert_eq!(parse_bearer("Basic dXNlcg=="), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("crm_abc"), None);
    }
}
