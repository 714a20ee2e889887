//! API-key authentication
//!
//! The identity provider itself is external; this gate only resolves an
//! `x-api-key` header to the owning user. Keys are stored hashed, so a
//! leaked database dump does not leak credentials.

use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;
use crate::features::FeatureState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller, resolved from the api_keys table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<FeatureState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &FeatureState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing API key".to_string()))?;

        let user_id = lookup_user(&state.db, key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid API key".to_string()))?;

        Ok(CurrentUser { id: user_id })
    }
}

async fn lookup_user(pool: &sqlx::PgPool, key: &str) -> Result<Option<Uuid>, AppError> {
    let key_hash = hash_key(key);

    let user_id: Option<Uuid> = sqlx::query_scalar(
        "SELECT user_id FROM api_keys WHERE key_hash = $1 AND active",
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}

/// SHA-256 hex digest of an API key, as stored in api_keys.key_hash.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_is_stable_hex() {
        let hash = hash_key("secret-key");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_key("secret-key"));
        assert_ne!(hash, hash_key("other-key"));
    }
}
