use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meeting_intel_api::blob::BlobStore;
use meeting_intel_api::config::Config;
use meeting_intel_api::db::create_pool;
use meeting_intel_api::llm_client::{self, LlmClient};
use meeting_intel_api::routes::build_router;
use meeting_intel_api::search::embeddings::EmbeddingClient;
use meeting_intel_api::speakers::web_search::DuckDuckGoSearch;
use meeting_intel_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("meeting_intel_api={},tower_http=info", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meeting Intel API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;

    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    let blobs = BlobStore::new(build_s3_client(&config).await, config.s3_bucket.clone());
    info!("S3 client initialized (bucket: {})", blobs.bucket());

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let web_search = Arc::new(DuckDuckGoSearch::new(config.search_user_agent.clone())?);

    let embedder = match &config.embeddings {
        Some(cfg) => {
            let client = EmbeddingClient::new(cfg)?;
            info!("Embeddings enabled (model: {})", client.model());
            Some(client)
        }
        None => {
            info!("EMBEDDINGS_URL not set; search falls back to keyword matching");
            None
        }
    };

    let state = AppState {
        db,
        redis,
        blobs,
        llm,
        web_search,
        embedder,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// S3 client for AWS, or MinIO when `S3_ENDPOINT` is set. Static credentials
/// are used when both key variables are present; otherwise the provider chain.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()));

    if let (Some(key_id), Some(secret)) = (&config.aws_access_key_id, &config.aws_secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "meeting-intel-static",
        ));
    }
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.s3_endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
