//! Request authentication.
//!
//! Browser routes authenticate with a `session` cookie; webhook and integration
//! routes send `Authorization: Bearer <api key>`. Keys are stored as SHA-256 hex digests.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const SESSION_COOKIE: &str = "session";
const API_KEY_PREFIX: &str = "mi_";

/// A caller authenticated by session cookie or API key.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// A caller authenticated by API key only.
#[derive(Debug, Clone)]
pub struct ApiKeyUser {
    pub user_id: String,
}

/// A caller presenting the configured admin key (batch jobs).
#[derive(Debug, Clone)]
pub struct AdminKey;

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if let Some(key) = bearer_token(&parts.headers) {
            let user_id = user_for_api_key(&state.db, key)
                .await?
                .ok_or(AppError::Unauthorized)?;
            return Ok(AuthUser { user_id });
        }

        if let Some(token) = session_cookie(&parts.headers) {
            let user_id = user_for_session(&state.db, &token)
                .await?
                .ok_or(AppError::Unauthorized)?;
            return Ok(AuthUser { user_id });
        }

        Err(AppError::Unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ApiKeyUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let key = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user_id = user_for_api_key(&state.db, key)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(ApiKeyUser { user_id })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let presented = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        match state.config.admin_api_key.as_deref() {
            Some(expected) if hash_api_key(expected) == hash_api_key(presented) => Ok(AdminKey),
            _ => Err(AppError::Unauthorized),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Generates a new plaintext API key. Shown to the user once.
pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", Uuid::new_v4().simple())
}

async fn user_for_api_key(pool: &PgPool, key: &str) -> Result<Option<String>, AppError> {
    let user_id: Option<String> = sqlx::query_scalar(
        "UPDATE api_keys SET last_used_at = NOW() WHERE key_hash = $1 RETURNING user_id",
    )
    .bind(hash_api_key(key))
    .fetch_optional(pool)
    .await?;
    Ok(user_id)
}

async fn user_for_session(pool: &PgPool, token: &str) -> Result<Option<String>, AppError> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()")
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer mi_abc"));
        assert_eq!(bearer_token(&headers), Some("mi_abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok123; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_session_cookie_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_api_key("mi_test");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_api_key("mi_test"));
        assert_ne!(h, hash_api_key("mi_other"));
    }

    #[test]
    fn test_generated_keys_are_prefixed_and_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert!(a.starts_with("mi_"));
        assert_ne!(a, b);
    }
}
