//! Transcript index accessor.
//!
//! Every query is scoped to records the caller can see: records they own and
//! records shared with them through a team.

use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

use crate::models::transcript::{SpeakerCorrection, TranscriptRow};

/// Page size used when walking a user's full collection.
const SCAN_PAGE_SIZE: i64 = 200;

/// Keyset cursor over (timestamp DESC, meeting_id DESC).
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub timestamp: String,
    pub meeting_id: String,
}

impl Cursor {
    pub fn after(row: &TranscriptRow) -> Self {
        Self {
            timestamp: row.timestamp.clone(),
            meeting_id: row.meeting_id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}|{}", self.timestamp, self.meeting_id)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (timestamp, meeting_id) = raw.split_once('|')?;
        if timestamp.is_empty() || meeting_id.is_empty() {
            return None;
        }
        Some(Self {
            timestamp: timestamp.to_string(),
            meeting_id: meeting_id.to_string(),
        })
    }
}

/// One page of a user's transcripts, newest first.
pub async fn list_page(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
    cursor: Option<&Cursor>,
) -> Result<Vec<TranscriptRow>> {
    let (ts, id) = match cursor {
        Some(c) => (Some(c.timestamp.as_str()), Some(c.meeting_id.as_str())),
        None => (None, None),
    };

    Ok(sqlx::query_as::<_, TranscriptRow>(
        r#"
        SELECT * FROM transcripts
        WHERE (user_id = $1 OR $1 = ANY(shared_with))
          AND ($2::text IS NULL OR (timestamp, meeting_id) < ($2, $3))
        ORDER BY timestamp DESC, meeting_id DESC
        LIMIT $4
        "#,
    )
    .bind(user_id)
    .bind(ts)
    .bind(id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Walks the user's entire collection page by page.
pub async fn all_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<TranscriptRow>> {
    let mut all = Vec::new();
    let mut cursor: Option<Cursor> = None;

    loop {
        let page = list_page(pool, user_id, SCAN_PAGE_SIZE, cursor.as_ref()).await?;
        let done = (page.len() as i64) < SCAN_PAGE_SIZE;
        cursor = page.last().map(Cursor::after);
        all.extend(page);
        if done || cursor.is_none() {
            break;
        }
    }

    debug!("Loaded {} transcripts for user {}", all.len(), user_id);
    Ok(all)
}

pub async fn get(pool: &PgPool, meeting_id: &str) -> Result<Option<TranscriptRow>> {
    Ok(
        sqlx::query_as::<_, TranscriptRow>("SELECT * FROM transcripts WHERE meeting_id = $1")
            .bind(meeting_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn batch_get(pool: &PgPool, meeting_ids: &[String]) -> Result<Vec<TranscriptRow>> {
    Ok(sqlx::query_as::<_, TranscriptRow>(
        "SELECT * FROM transcripts WHERE meeting_id = ANY($1)",
    )
    .bind(meeting_ids)
    .fetch_all(pool)
    .await?)
}

/// Candidate transcripts for a speaker, served by the `transcript_speakers` index.
/// `user_id = None` searches every user's transcripts.
pub async fn for_speaker(
    pool: &PgPool,
    speaker_key: &str,
    user_id: Option<&str>,
) -> Result<Vec<TranscriptRow>> {
    Ok(sqlx::query_as::<_, TranscriptRow>(
        r#"
        SELECT t.* FROM transcripts t
        JOIN transcript_speakers s ON s.meeting_id = t.meeting_id
        WHERE s.speaker_key = $1
          AND ($2::text IS NULL OR t.user_id = $2 OR $2 = ANY(t.shared_with))
        ORDER BY t.timestamp DESC
        "#,
    )
    .bind(speaker_key)
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Transcripts for a user whose `date` falls in `[start, end]` (YYYY-MM-DD, inclusive).
pub async fn for_user_between(
    pool: &PgPool,
    user_id: &str,
    start: &str,
    end: &str,
) -> Result<Vec<TranscriptRow>> {
    Ok(sqlx::query_as::<_, TranscriptRow>(
        r#"
        SELECT * FROM transcripts
        WHERE user_id = $1 AND date BETWEEN $2 AND $3
        ORDER BY timestamp ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?)
}

/// Users that own at least one transcript.
pub async fn distinct_user_ids(pool: &PgPool) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar(
        "SELECT DISTINCT user_id FROM transcripts WHERE user_id IS NOT NULL ORDER BY user_id",
    )
    .fetch_all(pool)
    .await?)
}

/// Conflicting rows are only updated for the same owner.
const UPSERT_SQL: &str = r#"
    INSERT INTO transcripts
        (meeting_id, user_id, s3_key, title, topic, date, timestamp, duration, speakers,
         speaker_corrections, event_type, received_at, url, is_private, privacy_level,
         privacy_reason, privacy_topics, privacy_confidence, privacy_work_percent,
         companies, team_id, visibility, shared_with, relinquished_by, indexed_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
    ON CONFLICT (meeting_id) DO UPDATE SET
        s3_key = EXCLUDED.s3_key,
        title = EXCLUDED.title,
        topic = COALESCE(EXCLUDED.topic, transcripts.topic),
        date = EXCLUDED.date,
        timestamp = EXCLUDED.timestamp,
        duration = EXCLUDED.duration,
        speakers = EXCLUDED.speakers,
        event_type = EXCLUDED.event_type,
        received_at = EXCLUDED.received_at,
        url = EXCLUDED.url,
        privacy_level = COALESCE(EXCLUDED.privacy_level, transcripts.privacy_level),
        privacy_reason = COALESCE(EXCLUDED.privacy_reason, transcripts.privacy_reason),
        privacy_topics = EXCLUDED.privacy_topics,
        privacy_confidence = COALESCE(EXCLUDED.privacy_confidence, transcripts.privacy_confidence),
        privacy_work_percent = COALESCE(EXCLUDED.privacy_work_percent, transcripts.privacy_work_percent),
        companies = EXCLUDED.companies,
        indexed_at = EXCLUDED.indexed_at
    WHERE transcripts.user_id IS NOT DISTINCT FROM EXCLUDED.user_id
"#;

/// Inserts or overwrites a transcript row and refreshes its speaker index entries.
/// Returns false when the id belongs to another owner and nothing was written.
pub async fn upsert(pool: &PgPool, row: &TranscriptRow) -> Result<bool> {
    let result = sqlx::query(UPSERT_SQL)
        .bind(&row.meeting_id)
        .bind(&row.user_id)
        .bind(&row.s3_key)
        .bind(&row.title)
        .bind(&row.topic)
        .bind(&row.date)
        .bind(&row.timestamp)
        .bind(row.duration)
        .bind(&row.speakers)
        .bind(&row.speaker_corrections)
        .bind(&row.event_type)
        .bind(&row.received_at)
        .bind(&row.url)
        .bind(row.is_private)
        .bind(&row.privacy_level)
        .bind(&row.privacy_reason)
        .bind(&row.privacy_topics)
        .bind(row.privacy_confidence)
        .bind(row.privacy_work_percent)
        .bind(&row.companies)
        .bind(&row.team_id)
        .bind(&row.visibility)
        .bind(&row.shared_with)
        .bind(&row.relinquished_by)
        .bind(row.indexed_at)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    // Corrections survive re-ingestion, so index from the stored row.
    if let Some(stored) = get(pool, &row.meeting_id).await? {
        reindex_speakers(pool, &stored).await?;
    }
    Ok(true)
}

/// Rewrites the speaker index entries for one transcript.
pub async fn reindex_speakers(pool: &PgPool, row: &TranscriptRow) -> Result<()> {
    let keys = row.speaker_keys();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM transcript_speakers WHERE meeting_id = $1")
        .bind(&row.meeting_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO transcript_speakers (meeting_id, speaker_key)
        SELECT $1, k FROM UNNEST($2::text[]) AS k
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&row.meeting_id)
    .bind(&keys)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Adds or overwrites the correction for `label` and refreshes the speaker index.
pub async fn set_correction(
    pool: &PgPool,
    meeting_id: &str,
    label: &str,
    correction: &SpeakerCorrection,
) -> Result<Option<TranscriptRow>> {
    let updated = sqlx::query_as::<_, TranscriptRow>(
        r#"
        UPDATE transcripts
        SET speaker_corrections = speaker_corrections || jsonb_build_object($2::text, $3::jsonb)
        WHERE meeting_id = $1
        RETURNING *
        "#,
    )
    .bind(meeting_id)
    .bind(label.trim().to_lowercase())
    .bind(Json(correction))
    .fetch_optional(pool)
    .await?;

    if let Some(row) = &updated {
        reindex_speakers(pool, row).await?;
    }
    Ok(updated)
}

pub async fn set_companies(pool: &PgPool, meeting_id: &str, companies: &[String]) -> Result<()> {
    sqlx::query("UPDATE transcripts SET companies = $2 WHERE meeting_id = $1")
        .bind(meeting_id)
        .bind(companies)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_private(pool: &PgPool, meeting_id: &str) -> Result<()> {
    sqlx::query("UPDATE transcripts SET is_private = TRUE, visibility = 'private' WHERE meeting_id = $1")
        .bind(meeting_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hands a transcript over to a team: ownership is cleared and the team's
/// members become the audience.
pub async fn relinquish(
    pool: &PgPool,
    meeting_id: &str,
    requester: &str,
    team_id: &str,
    member_ids: &[String],
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE transcripts
        SET user_id = NULL,
            relinquished_by = $2,
            team_id = $3,
            visibility = 'team',
            is_private = FALSE,
            shared_with = $4
        WHERE meeting_id = $1
        "#,
    )
    .bind(meeting_id)
    .bind(requester)
    .bind(team_id)
    .bind(member_ids)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes the index row. Speaker index rows cascade.
pub async fn delete(pool: &PgPool, meeting_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM transcripts WHERE meeting_id = $1")
        .bind(meeting_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_only_updates_rows_of_the_same_owner() {
        let conflict = UPSERT_SQL.find("ON CONFLICT").unwrap();
        let guard = UPSERT_SQL
            .find("WHERE transcripts.user_id IS NOT DISTINCT FROM EXCLUDED.user_id")
            .unwrap();
        assert!(guard > conflict);
        assert!(!UPSERT_SQL.contains("user_id = EXCLUDED.user_id,"));
    }

    #[test]
    fn test_cursor_roundtrip_with_colons_in_timestamp() {
        let c = Cursor {
            timestamp: "2025-01-15T10:00:00Z".into(),
            meeting_id: "abc".into(),
        };
        assert_eq!(Cursor::decode(&c.encode()), Some(c));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert_eq!(Cursor::decode("no-separator"), None);
        assert_eq!(Cursor::decode("|abc"), None);
    }
}
