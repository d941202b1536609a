use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{ApiKeyUser, AuthUser};
use crate::errors::AppError;
use crate::models::transcript::{SpeakerCorrection, TranscriptRow};
use crate::state::AppState;
use crate::transcripts::bulk::{self, BulkRequest, BulkResult};
use crate::transcripts::content::fetch_content;
use crate::transcripts::ingest::{self, IngestOutcome, NotionDocument};
use crate::transcripts::segments::{apply_corrections, parse_segments, Segment};
use crate::transcripts::store::{self, Cursor};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// An index row plus its speaker names after corrections.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptView {
    #[serde(flatten)]
    pub row: TranscriptRow,
    pub display_speakers: Vec<String>,
}

impl From<TranscriptRow> for TranscriptView {
    fn from(row: TranscriptRow) -> Self {
        let display_speakers = row.display_speakers();
        Self {
            row,
            display_speakers,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptListResponse {
    pub transcripts: Vec<TranscriptView>,
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptDetailResponse {
    pub transcript: TranscriptView,
    pub segments: Vec<Segment>,
    pub summary: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerEditRequest {
    pub original_name: String,
    pub new_name: String,
    #[serde(default)]
    pub linkedin: Option<String>,
}

/// Loads a transcript the caller can see, else 404.
async fn visible_transcript(state: &AppState, user_id: &str, id: &str) -> Result<TranscriptRow, AppError> {
    store::get(&state.db, id)
        .await?
        .filter(|t| t.is_visible_to(user_id))
        .ok_or_else(|| AppError::NotFound(format!("Transcript {id} not found")))
}

/// GET /api/transcripts
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<TranscriptListResponse>, AppError> {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let cursor = match q.cursor.as_deref() {
        Some(raw) => Some(Cursor::decode(raw).ok_or_else(|| AppError::Validation("Invalid cursor".into()))?),
        None => None,
    };

    let rows = store::list_page(&state.db, &user.user_id, limit, cursor.as_ref()).await?;
    let next_cursor = (rows.len() as i64 == limit)
        .then(|| rows.last().map(|r| Cursor::after(r).encode()))
        .flatten();

    Ok(Json(TranscriptListResponse {
        transcripts: rows.into_iter().map(TranscriptView::from).collect(),
        next_cursor,
    }))
}

/// GET /api/transcripts/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TranscriptDetailResponse>, AppError> {
    let row = visible_transcript(&state, &user.user_id, &id).await?;
    let content = fetch_content(&state.blobs, &row.s3_key)
        .await
        .map_err(|e| AppError::S3(e.to_string()))?;

    let mut segments = parse_segments(&content.text);
    apply_corrections(&mut segments, &row);

    Ok(Json(TranscriptDetailResponse {
        transcript: row.into(),
        segments,
        summary: content.summary,
    }))
}

/// PATCH /api/transcripts/:id/speakers
pub async fn handle_edit_speaker(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<SpeakerEditRequest>,
) -> Result<Json<TranscriptView>, AppError> {
    let original = req.original_name.trim();
    let new_name = req.new_name.trim();
    if original.is_empty() || new_name.is_empty() {
        return Err(AppError::Validation("originalName and newName are required".into()));
    }

    let row = visible_transcript(&state, &user.user_id, &id).await?;
    if !row.speakers.iter().any(|s| s.eq_ignore_ascii_case(original)) {
        return Err(AppError::Validation(format!("Speaker '{original}' is not in this transcript")));
    }

    let correction = SpeakerCorrection {
        name: new_name.to_string(),
        linkedin: req.linkedin.filter(|l| !l.trim().is_empty()),
    };
    let updated = store::set_correction(&state.db, &id, original, &correction)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transcript {id} not found")))?;

    info!("Speaker '{}' renamed to '{}' in {}", original, new_name, id);
    Ok(Json(updated.into()))
}

/// DELETE /api/transcripts/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let row = store::get(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transcript {id} not found")))?;
    bulk::check_single(&row, &user.user_id)?;
    bulk::delete_with_side_effects(&state, &row).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/transcripts/bulk
pub async fn handle_bulk(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkResult>, AppError> {
    Ok(Json(bulk::execute(&state, &user.user_id, req).await?))
}

/// POST /api/webhooks/transcript
pub async fn handle_transcript_webhook(
    State(state): State<AppState>,
    user: ApiKeyUser,
    Json(payload): Json<Value>,
) -> Result<Json<IngestOutcome>, AppError> {
    let outcome = ingest::ingest_transcript(&state, &user.user_id, payload).await?;
    Ok(Json(outcome))
}

/// POST /api/webhooks/notion
pub async fn handle_notion_webhook(
    State(state): State<AppState>,
    user: ApiKeyUser,
    Json(doc): Json<NotionDocument>,
) -> Result<Json<IngestOutcome>, AppError> {
    if doc.title.trim().is_empty() {
        warn!("Notion document without title from {}", user.user_id);
    }
    let outcome = ingest::ingest_document(&state, &user.user_id, doc).await?;
    Ok(Json(outcome))
}
