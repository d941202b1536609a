//! Embedded chunk storage and similarity ranking.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

/// Stored text is truncated to this many characters.
pub const STORED_TEXT_CHARS: usize = 500;

#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub chunk_key: String,
    pub meeting_id: String,
    pub user_id: Option<String>,
    pub chunk_index: i32,
    pub speaker: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Best-scoring chunk of one meeting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingHit {
    pub meeting_id: String,
    pub score: f32,
    pub snippet: String,
    pub chunk_index: i32,
}

pub fn chunk_key(meeting_id: &str, index: usize) -> String {
    format!("{meeting_id}_chunk_{index:04}")
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every chunk against `query`, keeps the best chunk per meeting and
/// returns the top `limit` meetings.
pub fn rank_meetings(query: &[f32], chunks: &[ChunkRow], limit: usize) -> Vec<MeetingHit> {
    let mut best: HashMap<&str, MeetingHit> = HashMap::new();
    for chunk in chunks {
        let score = cosine_similarity(query, &chunk.embedding);
        let better = best
            .get(chunk.meeting_id.as_str())
            .map_or(true, |hit| score > hit.score);
        if better {
            best.insert(
                &chunk.meeting_id,
                MeetingHit {
                    meeting_id: chunk.meeting_id.clone(),
                    score,
                    snippet: chunk.text.clone(),
                    chunk_index: chunk.chunk_index,
                },
            );
        }
    }

    let mut hits: Vec<MeetingHit> = best.into_values().collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

/// Replaces all chunks of a meeting.
pub async fn store_chunks(pool: &PgPool, meeting_id: &str, chunks: &[ChunkRow]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM transcript_chunks WHERE meeting_id = $1")
        .bind(meeting_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO transcript_chunks (chunk_key, meeting_id, user_id, chunk_index, speaker, text, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&chunk.chunk_key)
        .bind(&chunk.meeting_id)
        .bind(&chunk.user_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.speaker)
        .bind(&chunk.text)
        .bind(&chunk.embedding)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Returns the number of chunks removed.
pub async fn delete_for_meeting(pool: &PgPool, meeting_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM transcript_chunks WHERE meeting_id = $1")
        .bind(meeting_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Chunks of every transcript the user can see.
pub async fn chunks_visible_to(pool: &PgPool, user_id: &str) -> Result<Vec<ChunkRow>> {
    Ok(sqlx::query_as::<_, ChunkRow>(
        r#"
        SELECT c.* FROM transcript_chunks c
        JOIN transcripts t ON t.meeting_id = c.meeting_id
        WHERE t.user_id = $1 OR $1 = ANY(t.shared_with)
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(meeting: &str, index: i32, embedding: Vec<f32>) -> ChunkRow {
        ChunkRow {
            chunk_key: chunk_key(meeting, index as usize),
            meeting_id: meeting.to_string(),
            user_id: Some("u".into()),
            chunk_index: index,
            speaker: "Jane".into(),
            text: format!("{meeting} chunk {index}"),
            embedding,
        }
    }

    #[test]
    fn test_chunk_key_is_zero_padded() {
        assert_eq!(chunk_key("m1", 7), "m1_chunk_0007");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_keeps_best_chunk_per_meeting() {
        let chunks = vec![
            chunk("m1", 0, vec![0.0, 1.0]),
            chunk("m1", 1, vec![1.0, 0.1]),
            chunk("m2", 0, vec![0.5, 0.5]),
        ];
        let hits = rank_meetings(&[1.0, 0.0], &chunks, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].meeting_id, "m1");
        assert_eq!(hits[0].chunk_index, 1);
        assert_eq!(rank_meetings(&[1.0, 0.0], &chunks, 1).len(), 1);
    }
}
