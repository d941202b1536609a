//! Chunks a transcript, embeds the chunks and stores them.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::transcript::is_real_speaker_name;
use crate::search::chunking::chunk_transcript;
use crate::search::embeddings::EmbeddingClient;
use crate::search::vectors::{self, chunk_key, ChunkRow, STORED_TEXT_CHARS};

pub struct IndexRequest<'a> {
    pub meeting_id: &'a str,
    pub user_id: Option<&'a str>,
    pub text: &'a str,
    pub speakers: &'a [String],
}

/// `"Meeting participants: A, B. "` over real names only; empty when there are none.
pub fn participant_prefix(speakers: &[String]) -> String {
    let real: Vec<&str> = speakers
        .iter()
        .map(|s| s.trim())
        .filter(|s| is_real_speaker_name(s))
        .collect();
    if real.is_empty() {
        String::new()
    } else {
        format!("Meeting participants: {}. ", real.join(", "))
    }
}

/// First real speaker, else the first label, else `"unknown"`.
pub fn primary_speaker(speakers: &[String]) -> String {
    speakers
        .iter()
        .find(|s| is_real_speaker_name(s))
        .or_else(|| speakers.first())
        .cloned()
        .unwrap_or_else(|| "unknown".to_string())
}

/// Returns the number of chunks stored.
pub async fn index_transcript(
    pool: &PgPool,
    embedder: &EmbeddingClient,
    req: &IndexRequest<'_>,
) -> Result<usize> {
    let chunks = chunk_transcript(req.text);
    if chunks.is_empty() {
        return Ok(0);
    }

    let prefix = participant_prefix(req.speakers);
    let inputs: Vec<String> = chunks.iter().map(|c| format!("{prefix}{c}")).collect();
    let embeddings = embedder.embed_batch(&inputs).await?;

    let speaker = primary_speaker(req.speakers);
    let rows: Vec<ChunkRow> = chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (text, embedding))| ChunkRow {
            chunk_key: chunk_key(req.meeting_id, i),
            meeting_id: req.meeting_id.to_string(),
            user_id: req.user_id.map(String::from),
            chunk_index: i as i32,
            speaker: speaker.clone(),
            text: text.chars().take(STORED_TEXT_CHARS).collect(),
            embedding,
        })
        .collect();

    vectors::store_chunks(pool, req.meeting_id, &rows).await?;
    info!("Stored {} chunk(s) for {}", rows.len(), req.meeting_id);
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefix_skips_generic_labels() {
        assert_eq!(
            participant_prefix(&names(&["Jane Doe", "Speaker 2", "Bob"])),
            "Meeting participants: Jane Doe, Bob. "
        );
        assert_eq!(participant_prefix(&names(&["Speaker 1", "Unknown"])), "");
    }

    #[test]
    fn test_primary_speaker() {
        assert_eq!(primary_speaker(&names(&["Speaker 1", "Jane"])), "Jane");
        assert_eq!(primary_speaker(&names(&["Speaker 1"])), "Speaker 1");
        assert_eq!(primary_speaker(&[]), "unknown");
    }
}
