use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::search::embeddings::EmbeddingClient;
use crate::speakers::web_search::WebSearch;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every client is built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Per-speaker enrichment locks.
    pub redis: RedisClient,
    pub blobs: BlobStore,
    pub llm: LlmClient,
    /// Pluggable web search backend. Default: DuckDuckGo HTML scraping.
    pub web_search: Arc<dyn WebSearch>,
    /// `None` when no embeddings endpoint is configured; search falls back to keywords.
    pub embedder: Option<EmbeddingClient>,
    pub config: Config,
}

#[cfg(test)]
impl AppState {
    /// State whose clients never connect until used. Only for routes that fail
    /// before touching storage.
    pub fn for_tests() -> Self {
        use crate::config::IngestFeatures;
        use crate::speakers::web_search::DuckDuckGoSearch;

        let config = Config {
            database_url: "postgres://localhost/meeting_intel_test".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            s3_bucket: "test-bucket".into(),
            s3_endpoint: None,
            aws_region: "us-east-1".into(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            anthropic_api_key: "test".into(),
            embeddings: None,
            admin_api_key: Some("admin-secret".into()),
            search_user_agent: "test-agent".into(),
            features: IngestFeatures::default(),
            historical_context_days: 14,
            port: 0,
            rust_log: "info".into(),
        };
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::new()
                .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                .region(aws_sdk_s3::config::Region::new("us-east-1"))
                .build(),
        );

        Self {
            db: sqlx::postgres::PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap(),
            redis: RedisClient::open(config.redis_url.as_str()).unwrap(),
            blobs: BlobStore::new(s3, config.s3_bucket.clone()),
            llm: LlmClient::new(config.anthropic_api_key.clone()).unwrap(),
            web_search: Arc::new(DuckDuckGoSearch::new(config.search_user_agent.clone()).unwrap()),
            embedder: None,
            config,
        }
    }
}
