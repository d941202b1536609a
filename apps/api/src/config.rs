use anyhow::{Context, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; MeetingIntel/1.0)";

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` and `ANTHROPIC_API_KEY` are required; everything else
/// falls back to a hardcoded default.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub anthropic_api_key: String,
    pub embeddings: Option<EmbeddingsConfig>,
    pub admin_api_key: Option<String>,
    pub search_user_agent: String,
    pub features: IngestFeatures,
    pub historical_context_days: i64,
    pub port: u16,
    pub rust_log: String,
}

/// OpenAI-compatible embeddings endpoint. Vectors are disabled when unset.
#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Toggles for the non-fatal analysis steps run at ingest time.
#[derive(Debug, Clone, Copy)]
pub struct IngestFeatures {
    pub topics: bool,
    pub privacy: bool,
    pub companies: bool,
    pub vectors: bool,
}

impl Default for IngestFeatures {
    fn default() -> Self {
        Self {
            topics: true,
            privacy: true,
            companies: true,
            vectors: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let embeddings = optional_env("EMBEDDINGS_URL").map(|url| EmbeddingsConfig {
            url,
            api_key: optional_env("EMBEDDINGS_API_KEY"),
            model: env_or("EMBEDDINGS_MODEL", "text-embedding-3-small"),
        });

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            s3_bucket: env_or("S3_BUCKET", "meeting-intel-transcripts"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_region: env_or("AWS_REGION", "us-east-1"),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            embeddings,
            admin_api_key: optional_env("ADMIN_API_KEY"),
            search_user_agent: env_or("SEARCH_USER_AGENT", DEFAULT_USER_AGENT),
            features: IngestFeatures {
                topics: bool_env("ENABLE_TOPICS", true)?,
                privacy: bool_env("ENABLE_PRIVACY", true)?,
                companies: bool_env("ENABLE_COMPANIES", true)?,
                vectors: bool_env("ENABLE_VECTORS", true)?,
            },
            historical_context_days: env_or("HISTORICAL_CONTEXT_DAYS", "14")
                .parse::<i64>()
                .context("HISTORICAL_CONTEXT_DAYS must be an integer")?,
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn bool_env(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        None => Ok(default),
        Some(v) => parse_bool(&v).with_context(|| format!("{key} must be true or false, got '{v}'")),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("not a boolean: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("no").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_ingest_features_default_all_enabled() {
        let f = IngestFeatures::default();
        assert!(f.topics && f.privacy && f.companies && f.vectors);
    }
}
