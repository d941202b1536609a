//! Per-speaker enrichment lock held in Redis.

use anyhow::Result;
use redis::Client as RedisClient;
use tracing::warn;
use uuid::Uuid;

const LOCK_TTL_SECONDS: u64 = 120;

/// Deletes the key only if it still holds our token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct EnrichmentLock {
    key: String,
    token: String,
}

pub fn lock_key(speaker_key: &str) -> String {
    format!("lock:enrich:{speaker_key}")
}

impl EnrichmentLock {
    /// `Ok(None)` when another enrichment of the same speaker holds the lock.
    pub async fn acquire(client: &RedisClient, speaker_key: &str) -> Result<Option<Self>> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let key = lock_key(speaker_key);
        let token = Uuid::new_v4().to_string();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECONDS)
            .query_async(&mut conn)
            .await?;

        Ok(acquired.map(|_| Self { key, token }))
    }

    /// Releases the lock. Failures are logged; the TTL bounds a stuck lock.
    pub async fn release(self, client: &RedisClient) {
        let result: redis::RedisResult<i64> = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::Script::new(RELEASE_SCRIPT)
                .key(&self.key)
                .arg(&self.token)
                .invoke_async(&mut conn)
                .await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to release {}: {e}", self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_format() {
        assert_eq!(lock_key("jane doe"), "lock:enrich:jane doe");
    }
}
