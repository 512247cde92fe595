//! API keys for machine access (data export): generation, SHA-256 digests, bearer verification.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::sql::{qualified_table, quoted};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

pub const API_KEY_PREFIX: &str = "crm_";
/// Characters of the plaintext key kept for display.
const DISPLAY_PREFIX_LEN: usize = 8;

/// Verified caller of a key-authenticated endpoint.
#[derive(Clone, Debug)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// New plaintext key: prefix plus 64 hex chars from two v4 UUIDs.
pub fn generate_key() -> String {
    format!(
        "{}{}{}",
        API_KEY_PREFIX,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub fn display_prefix(key: &str) -> String {
    key.chars().take(DISPLAY_PREFIX_LEN).collect()
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(t) if t <= now)
}

/// Look up the key by digest, reject expired keys, and stamp `last_used_at`.
pub async fn authenticate(pool: &PgPool, entity: &ResolvedEntity, token: &str) -> Result<ApiKeyRecord, AppError> {
    let table = qualified_table(entity);
    let sql = format!(
        "SELECT {}, {}, {}, {} FROM {} WHERE {} = $1",
        quoted("id"),
        quoted("user_id"),
        quoted("name"),
        quoted("expires_at"),
        table,
        quoted("key_hash")
    );
    let row = sqlx::query_as::<_, (Uuid, Uuid, String, Option<DateTime<Utc>>)>(&sql)
        .bind(hash_key(token))
        .fetch_optional(pool)
        .await?;
    let Some((id, user_id, name, expires_at)) = row else {
        tracing::warn!("data export rejected: unknown API key");
        return Err(AppError::Unauthorized("Invalid API key".into()));
    };
    if is_expired(expires_at, Utc::now()) {
        tracing::warn!(key_id = %id, "data export rejected: API key expired");
        return Err(AppError::Unauthorized("API key has expired".into()));
    }
    let touch = format!(
        "UPDATE {} SET {} = NOW() WHERE {} = $1",
        table,
        quoted("last_used_at"),
        quoted("id")
    );
    sqlx::query(&touch).bind(id).execute(pool).await?;
    Ok(ApiKeyRecord {
        id,
        user_id,
        name,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn generated_keys_are_prefixed_and_unique() {
        let a = generate_key();
        let b = generate_key();
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_eq!(a.len(), API_KEY_PREFIX.len() + 64);
        assert_ne!(a, b);
        assert_eq!(display_prefix(&a).len(), 8);
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn expiry_is_inclusive_of_now() {
        let now = Utc::now();
        assert!(!is_expired(None, now));
        assert!(!is_expired(Some(now + Duration::days(1)), now));
        assert!(is_expired(Some(now), now));
        assert!(is_expired(Some(now - Duration::seconds(1)), now));
    }
}
