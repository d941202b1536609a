//! Rebuilds the `transcript_speakers` lookup index from the transcripts table.
//! Exits 0 on success, 1 on failure.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meeting_intel_api::db::create_pool;
use meeting_intel_api::models::transcript::TranscriptRow;
use meeting_intel_api::transcripts::store;

const BATCH_SIZE: i64 = 500;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Reindex failed: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = create_pool(&url).await?;

    let mut after = String::new();
    let mut total = 0usize;
    loop {
        let batch = sqlx::query_as::<_, TranscriptRow>(
            "SELECT * FROM transcripts WHERE meeting_id > $1 ORDER BY meeting_id LIMIT $2",
        )
        .bind(&after)
        .bind(BATCH_SIZE)
        .fetch_all(&pool)
        .await?;

        let Some(last) = batch.last() else { break };
        after = last.meeting_id.clone();

        for row in &batch {
            store::reindex_speakers(&pool, row).await?;
        }
        total += batch.len();
        info!("Reindexed {} transcript(s)", total);
    }

    info!("Done: {} transcript(s) reindexed", total);
    Ok(())
}
