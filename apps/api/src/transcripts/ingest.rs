//! Webhook ingestion: raw payload -> blob envelope -> analysed index row.
//!
//! The envelope is written first and is the source of truth. Every analysis
//! step after that (topic, privacy, companies, vectors) is non-fatal: a failure
//! is logged and the transcript is indexed without that field.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::companies;
use crate::errors::AppError;
use crate::models::transcript::{CorrectionMap, TranscriptRow};
use crate::search::indexing;
use crate::state::AppState;
use crate::transcripts::{analysis, store};

const MAX_SAFE_TITLE_CHARS: usize = 50;
pub const NOTION_EVENT_TYPE: &str = "notion_page";

/// What gets written to the blob store for every ingested record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub received_at: String,
    pub event_type: String,
    pub raw_payload: Value,
}

/// The fields of a transcript webhook the pipeline reads. Unknown fields are
/// kept in the raw envelope.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default, alias = "meetingId")]
    pub meeting_id: Option<String>,
    #[serde(default, alias = "meeting_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub meeting: MeetingInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct MeetingInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub speakers: Vec<SpeakerInfo>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeakerInfo {
    #[serde(default)]
    pub index: Option<Value>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl SpeakerInfo {
    /// "First Last" when a first name is known, otherwise "Speaker {index}".
    pub fn display_name(&self) -> Option<String> {
        if let Some(first) = self.first_name.as_deref().filter(|f| !f.trim().is_empty()) {
            let full = format!("{} {}", first.trim(), self.last_name.as_deref().unwrap_or(""));
            return Some(full.trim().to_string());
        }
        let index = match self.index.as_ref()? {
            Value::Number(n) if n.as_f64().unwrap_or(0.0) != 0.0 => n.to_string(),
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return None,
        };
        Some(format!("Speaker {index}"))
    }
}

/// A document pushed from the Notion integration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
}

/// Metadata extracted from an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestMetadata {
    pub meeting_id: String,
    pub title: String,
    pub date: String,
    pub timestamp: String,
    pub duration: i64,
    pub speakers: Vec<String>,
    pub event_type: String,
    pub received_at: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub message: &'static str,
    pub event_type: String,
    pub meeting_id: String,
    pub s3_key: String,
    pub topic: Option<String>,
    pub companies: Vec<String>,
    pub vectors: usize,
}

/// Replaces anything other than alphanumerics, space, `-` and `_` and caps the length.
pub fn safe_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SAFE_TITLE_CHARS)
        .collect()
}

/// `users/{user}/meetings/YYYY/MM/DD/{YYYYMMDD_HHMMSS}_{safeTitle}_{meetingId}.json`
pub fn meeting_blob_key(user_id: &str, now: DateTime<Utc>, title: &str, meeting_id: &str) -> String {
    format!(
        "users/{}/meetings/{}/{}_{}_{}.json",
        user_id,
        now.format("%Y/%m/%d"),
        now.format("%Y%m%d_%H%M%S"),
        safe_title(title),
        meeting_id
    )
}

/// `users/{user}/documents/YYYY/MM/DD/{id}.json`
pub fn document_blob_key(user_id: &str, now: DateTime<Utc>, doc_id: &str) -> String {
    format!(
        "users/{}/documents/{}/{}.json",
        user_id,
        now.format("%Y/%m/%d"),
        doc_id
    )
}

fn iso_utc(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parses RFC 3339 timestamps, and naive `YYYY-MM-DDTHH:MM:SS[.f]` as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

/// Pulls `YYYY-MM-DD` out of the date path segments that follow `meetings/` or `documents/`.
fn date_from_key(key: &str) -> Option<String> {
    let parts: Vec<&str> = key.split('/').collect();
    let pos = parts
        .iter()
        .position(|p| *p == "meetings" || *p == "documents")?;
    let (y, m, d) = (parts.get(pos + 1)?, parts.get(pos + 2)?, parts.get(pos + 3)?);
    let ok = y.len() == 4 && m.len() == 2 && d.len() == 2;
    ok.then(|| format!("{y}-{m}-{d}"))
}

/// Meeting id from a `..._{meetingId}.json` file name.
fn meeting_id_from_key(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    let stem = file.strip_suffix(".json").unwrap_or(file);
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() >= 4 {
        parts[parts.len() - 1].to_string()
    } else {
        stem.to_string()
    }
}

/// Derives index metadata from a stored envelope.
pub fn extract_metadata(key: &str, envelope: &Envelope, now: DateTime<Utc>) -> IngestMetadata {
    let payload: WebhookPayload =
        serde_json::from_value(envelope.raw_payload.clone()).unwrap_or_default();
    let meeting = &payload.data.meeting;

    let meeting_id = meeting
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| meeting_id_from_key(key));

    let start = meeting.start_date.as_deref().filter(|s| !s.is_empty());
    let (date, timestamp) = match start {
        Some(raw) => match parse_timestamp(raw) {
            Some(dt) => (dt.format("%Y-%m-%d").to_string(), raw.to_string()),
            None => (now.format("%Y-%m-%d").to_string(), iso_utc(now)),
        },
        None => {
            let date = date_from_key(key).unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
            let ts = if envelope.received_at.is_empty() {
                iso_utc(now)
            } else {
                envelope.received_at.clone()
            };
            (date, ts)
        }
    };

    let title = meeting
        .title
        .clone()
        .or(payload.title.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    IngestMetadata {
        meeting_id,
        title,
        date,
        timestamp,
        duration: meeting.duration.unwrap_or(0.0) as i64,
        speakers: meeting.speakers.iter().filter_map(SpeakerInfo::display_name).collect(),
        event_type: envelope.event_type.clone(),
        received_at: envelope.received_at.clone(),
        url: meeting.url.clone().unwrap_or_default(),
    }
}

/// Raw transcript text inside an envelope.
pub fn transcript_text(envelope: &Envelope) -> String {
    let data = &envelope.raw_payload["data"];
    data["raw_content"]
        .as_str()
        .or_else(|| envelope.raw_payload["content"].as_str())
        .unwrap_or_default()
        .to_string()
}

/// Summary text when the recorder produced one.
pub fn summary_text(envelope: &Envelope) -> Option<String> {
    envelope.raw_payload["data"]["summary"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

impl IngestMetadata {
    fn into_row(self, user_id: &str, s3_key: String) -> TranscriptRow {
        TranscriptRow {
            meeting_id: self.meeting_id,
            user_id: Some(user_id.to_string()),
            s3_key,
            title: self.title,
            topic: None,
            date: self.date,
            timestamp: self.timestamp,
            duration: self.duration,
            speakers: self.speakers,
            speaker_corrections: Json(CorrectionMap::new()),
            event_type: self.event_type,
            received_at: self.received_at,
            url: self.url,
            is_private: false,
            privacy_level: None,
            privacy_reason: None,
            privacy_topics: Vec::new(),
            privacy_confidence: None,
            privacy_work_percent: None,
            companies: Vec::new(),
            team_id: None,
            visibility: "private".to_string(),
            shared_with: Vec::new(),
            relinquished_by: None,
            indexed_at: Utc::now(),
        }
    }
}

/// Rejects ingesting onto a meeting id that is held by anyone but `user_id`,
/// including team records whose owner relinquished them.
pub fn ensure_writable(existing: Option<&TranscriptRow>, user_id: &str) -> Result<(), AppError> {
    match existing {
        Some(row) if row.user_id.as_deref() != Some(user_id) => Err(AppError::Conflict(format!(
            "Meeting {} belongs to another account",
            row.meeting_id
        ))),
        _ => Ok(()),
    }
}

/// POST /api/webhooks/transcript pipeline.
pub async fn ingest_transcript(
    state: &AppState,
    user_id: &str,
    payload: Value,
) -> Result<IngestOutcome, AppError> {
    if !payload.is_object() {
        return Err(AppError::Validation("Payload must be a JSON object".into()));
    }
    let now = Utc::now();
    let typed: WebhookPayload = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {e}")))?;

    let meeting_id = typed
        .data
        .meeting
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| typed.meeting_id.clone().filter(|id| !id.is_empty()))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let title = typed
        .title
        .clone()
        .or(typed.data.meeting.title.clone())
        .unwrap_or_else(|| "Untitled".to_string());

    let envelope = Envelope {
        received_at: iso_utc(now),
        event_type: typed.event.clone().unwrap_or_else(|| "unknown".to_string()),
        raw_payload: payload,
    };
    ensure_writable(store::get(&state.db, &meeting_id).await?.as_ref(), user_id)?;

    let key = meeting_blob_key(user_id, now, &title, &meeting_id);
    state
        .blobs
        .put_json(&key, &envelope)
        .await
        .map_err(|e| AppError::S3(e.to_string()))?;

    let mut metadata = extract_metadata(&key, &envelope, now);
    metadata.meeting_id = meeting_id;
    let text = transcript_text(&envelope);
    index_record(state, user_id, metadata, key, &text).await
}

/// POST /api/webhooks/notion pipeline.
pub async fn ingest_document(
    state: &AppState,
    user_id: &str,
    doc: NotionDocument,
) -> Result<IngestOutcome, AppError> {
    if doc.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    let now = Utc::now();
    let doc_id = doc
        .page_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let envelope = Envelope {
        received_at: iso_utc(now),
        event_type: NOTION_EVENT_TYPE.to_string(),
        raw_payload: serde_json::json!({
            "title": doc.title,
            "content": doc.content,
            "url": doc.url,
            "page_id": doc_id,
        }),
    };
    ensure_writable(store::get(&state.db, &doc_id).await?.as_ref(), user_id)?;

    let key = document_blob_key(user_id, now, &doc_id);
    state
        .blobs
        .put_json(&key, &envelope)
        .await
        .map_err(|e| AppError::S3(e.to_string()))?;

    let metadata = IngestMetadata {
        meeting_id: doc_id,
        title: if doc.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            doc.title.clone()
        },
        date: now.format("%Y-%m-%d").to_string(),
        timestamp: envelope.received_at.clone(),
        duration: 0,
        speakers: Vec::new(),
        event_type: NOTION_EVENT_TYPE.to_string(),
        received_at: envelope.received_at.clone(),
        url: doc.url.unwrap_or_default(),
    };
    index_record(state, user_id, metadata, key, &doc.content).await
}

/// Runs the optional analysis steps and writes the index row.
async fn index_record(
    state: &AppState,
    user_id: &str,
    metadata: IngestMetadata,
    s3_key: String,
    text: &str,
) -> Result<IngestOutcome, AppError> {
    let features = state.config.features;
    let title = metadata.title.clone();
    let mut row = metadata.into_row(user_id, s3_key);

    if features.topics {
        match analysis::generate_topic(&state.llm, text, &title).await {
            Ok(topic) => row.topic = topic,
            Err(e) => warn!("Topic generation failed for {}: {e}", row.meeting_id),
        }
    }

    if features.privacy {
        match analysis::analyze_privacy(&state.llm, text, &title).await {
            Ok(Some(p)) => {
                row.privacy_level = Some(p.level.as_str().to_string());
                row.privacy_reason = Some(p.reason);
                row.privacy_topics = p.topics;
                row.privacy_confidence = Some(p.confidence);
                row.privacy_work_percent = Some(p.work_percent);
            }
            Ok(None) => {}
            Err(e) => warn!("Privacy analysis failed for {}: {e}", row.meeting_id),
        }
    }

    if features.companies {
        match companies::extraction::extract_companies(&state.llm, text, &title).await {
            Ok(found) => {
                if let Err(e) = companies::store::record_mentions(
                    &state.db,
                    user_id,
                    &row.meeting_id,
                    &row.date,
                    &found,
                )
                .await
                {
                    warn!("Storing companies failed for {}: {e}", row.meeting_id);
                }
                row.companies = found.into_iter().map(|c| c.name).collect();
            }
            Err(e) => warn!("Company extraction failed for {}: {e}", row.meeting_id),
        }
    }

    if !store::upsert(&state.db, &row).await? {
        warn!("Ingest by {} lost a race for {}", user_id, row.meeting_id);
        return Err(AppError::Conflict(format!(
            "Meeting {} belongs to another account",
            row.meeting_id
        )));
    }
    info!(
        "Indexed {} ({} speakers, topic: {})",
        row.meeting_id,
        row.speakers.len(),
        row.topic.as_deref().unwrap_or("-")
    );

    let mut vectors = 0;
    if features.vectors {
        if let Some(embedder) = &state.embedder {
            let req = indexing::IndexRequest {
                meeting_id: &row.meeting_id,
                user_id: Some(user_id),
                text,
                speakers: &row.speakers,
            };
            match indexing::index_transcript(&state.db, embedder, &req).await {
                Ok(n) => vectors = n,
                Err(e) => warn!("Vector indexing failed for {}: {e}", row.meeting_id),
            }
        }
    }

    Ok(IngestOutcome {
        message: "Webhook received",
        event_type: row.event_type,
        meeting_id: row.meeting_id,
        s3_key: row.s3_key,
        topic: row.topic,
        companies: row.companies,
        vectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 9, 5, 7).unwrap()
    }

    fn envelope(payload: Value) -> Envelope {
        Envelope {
            received_at: "2025-03-04T09:05:07.000000Z".into(),
            event_type: "transcript_created".into(),
            raw_payload: payload,
        }
    }

    #[test]
    fn test_safe_title_replaces_and_truncates() {
        assert_eq!(safe_title("Q4 plan: v2/final!"), "Q4 plan_ v2_final_");
        assert_eq!(safe_title(&"x".repeat(80)).len(), 50);
    }

    #[test]
    fn test_meeting_blob_key_layout() {
        let key = meeting_blob_key("u1", now(), "Weekly sync", "abc123");
        assert_eq!(
            key,
            "users/u1/meetings/2025/03/04/20250304_090507_Weekly sync_abc123.json"
        );
    }

    #[test]
    fn test_extract_metadata_from_full_payload() {
        let env = envelope(json!({
            "event": "transcript_created",
            "data": {
                "raw_content": "Speaker 1 | 00:00\nhi",
                "meeting": {
                    "id": "m-42",
                    "title": "Roadmap",
                    "duration": 1800,
                    "start_date": "2025-02-28T15:30:00Z",
                    "url": "https://krisp.ai/m/42",
                    "speakers": [
                        {"index": 1, "first_name": "Jane", "last_name": "Doe"},
                        {"index": 2},
                        {"index": 3, "first_name": "Bob"}
                    ]
                }
            }
        }));
        let meta = extract_metadata("users/u1/meetings/2025/03/04/x.json", &env, now());
        assert_eq!(meta.meeting_id, "m-42");
        assert_eq!(meta.date, "2025-02-28");
        assert_eq!(meta.timestamp, "2025-02-28T15:30:00Z");
        assert_eq!(meta.duration, 1800);
        assert_eq!(meta.speakers, vec!["Jane Doe", "Speaker 2", "Bob"]);
        assert_eq!(meta.url, "https://krisp.ai/m/42");
    }

    #[test]
    fn test_extract_metadata_falls_back_to_key() {
        let env = envelope(json!({"data": {"meeting": {}}}));
        let key = "users/u1/meetings/2025/01/09/20250109_101010_Sync_zz9.json";
        let meta = extract_metadata(key, &env, now());
        assert_eq!(meta.meeting_id, "zz9");
        assert_eq!(meta.date, "2025-01-09");
        assert_eq!(meta.timestamp, env.received_at);
        assert_eq!(meta.title, "Untitled");
    }

    #[test]
    fn test_unparseable_start_date_uses_now() {
        let env = envelope(json!({"data": {"meeting": {"id": "m", "start_date": "last tuesday"}}}));
        let meta = extract_metadata("k.json", &env, now());
        assert_eq!(meta.date, "2025-03-04");
    }

    #[test]
    fn test_speaker_index_zero_is_dropped() {
        let s = SpeakerInfo {
            index: Some(json!(0)),
            ..Default::default()
        };
        assert_eq!(s.display_name(), None);
    }

    #[test]
    fn test_transcript_text_reads_document_content_too() {
        let env = envelope(json!({"title": "Doc", "content": "notion body"}));
        assert_eq!(transcript_text(&env), "notion body");
    }

    #[test]
    fn test_ingest_cannot_overwrite_another_users_meeting() {
        let alice = TranscriptRow::fixture("shared-id", Some("alice"), &["Alice"]);
        assert!(ensure_writable(Some(&alice), "alice").is_ok());
        assert!(matches!(
            ensure_writable(Some(&alice), "bob"),
            Err(AppError::Conflict(_))
        ));
        assert!(ensure_writable(None, "bob").is_ok());
    }

    #[test]
    fn test_ingest_cannot_overwrite_relinquished_meeting() {
        let mut row = TranscriptRow::fixture("team-id", None, &[]);
        row.shared_with = vec!["alice".into()];
        assert!(matches!(
            ensure_writable(Some(&row), "alice"),
            Err(AppError::Conflict(_))
        ));
    }
}
