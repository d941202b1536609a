//! Back-fills `user_id` on speaker profiles that predate per-user ownership.
//!
//! Each profile gets the owner of the most recent transcript that mentions the
//! speaker. Exits 0 on success, 1 on failure.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meeting_intel_api::db::create_pool;
use meeting_intel_api::speakers::profiles;
use meeting_intel_api::transcripts::store;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Migration failed: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = create_pool(&url).await?;

    let pending = profiles::list_missing_user_id(&pool).await?;
    info!("{} profile(s) without user_id", pending.len());

    let (mut updated, mut orphaned) = (0usize, 0usize);
    for profile in &pending {
        let owner = store::for_speaker(&pool, &profile.name_key, None)
            .await?
            .into_iter()
            .find_map(|t| t.user_id);

        match owner {
            Some(user_id) => {
                profiles::set_user_id(&pool, &profile.name_key, &user_id).await?;
                info!("{} -> {}", profile.name_key, user_id);
                updated += 1;
            }
            None => {
                warn!("No owned transcript mentions {}", profile.name_key);
                orphaned += 1;
            }
        }
    }

    info!("Done: {} updated, {} without an owner", updated, orphaned);
    Ok(())
}
