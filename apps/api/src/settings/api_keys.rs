use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{generate_api_key, hash_api_key};
use crate::models::user::ApiKeyRow;

/// Characters of the plaintext key kept for display.
const DISPLAY_PREFIX_CHARS: usize = 8;

pub fn display_prefix(key: &str) -> String {
    key.chars().take(DISPLAY_PREFIX_CHARS).collect()
}

pub async fn list(pool: &PgPool, user_id: &str) -> Result<Vec<ApiKeyRow>> {
    Ok(sqlx::query_as::<_, ApiKeyRow>(
        "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Returns the stored row and the plaintext key, which is not recoverable later.
pub async fn create(pool: &PgPool, user_id: &str, label: Option<&str>) -> Result<(ApiKeyRow, String)> {
    let key = generate_api_key();
    let row = sqlx::query_as::<_, ApiKeyRow>(
        r#"
        INSERT INTO api_keys (id, user_id, key_hash, key_prefix, label)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(hash_api_key(&key))
    .bind(display_prefix(&key))
    .bind(label.map(str::trim).filter(|l| !l.is_empty()))
    .fetch_one(pool)
    .await?;
    Ok((row, key))
}

/// True when a key owned by `user_id` was removed.
pub async fn delete(pool: &PgPool, user_id: &str, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let key = generate_api_key();
        assert_eq!(display_prefix(&key).len(), 8);
        assert!(display_prefix(&key).starts_with("mi_"));
        assert_ne!(hash_api_key(&key), key);
    }
}
