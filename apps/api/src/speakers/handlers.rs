use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{AdminKey, AuthUser};
use crate::errors::AppError;
use crate::models::speaker::{profile_key, SpeakerProfileRow};
use crate::speakers::context::{extract_context, SpeakerContext};
use crate::speakers::enrichment::{self, BatchReport, EnrichOutcome};
use crate::speakers::listing::{self, SpeakerStats, SpeakerSummary};
use crate::speakers::profiles::{self, ProfileEdit, ProfilePatch};
use crate::speakers::resolver::{self, MatchedMeeting};
use crate::state::AppState;
use crate::transcripts::store;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSpeakersQuery {
    #[serde(default)]
    pub include_generic: bool,
}

#[derive(Serialize)]
pub struct SpeakerListResponse {
    pub speakers: Vec<SpeakerSummary>,
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerDetailResponse {
    pub name: String,
    pub canonical_name: String,
    pub linkedin: Option<String>,
    pub profile: Option<SpeakerProfileRow>,
    pub meetings: Vec<MatchedMeeting>,
    pub stats: SpeakerStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRequest {
    #[serde(default)]
    pub force_refresh: bool,
}

fn require_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Speaker name is required".into()));
    }
    Ok(name)
}

/// GET /api/speakers
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ListSpeakersQuery>,
) -> Result<Json<SpeakerListResponse>, AppError> {
    let records = store::all_for_user(&state.db, &user.user_id).await?;
    let mut speakers = listing::aggregate(&records, q.include_generic);

    let keys: Vec<String> = speakers.iter().map(|s| profile_key(&s.name)).collect();
    let stored = profiles::get_many(&state.db, &keys).await?;
    listing::attach_profiles(&mut speakers, &stored);

    Ok(Json(SpeakerListResponse {
        total: speakers.len(),
        speakers,
    }))
}

/// GET /api/speakers/:name
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<SpeakerDetailResponse>, AppError> {
    let name = require_name(&name)?;
    let resolved = resolver::resolve(&state.db, name, Some(&user.user_id)).await?;

    let mut profile = profiles::get(&state.db, &resolved.canonical_name).await?;
    if profile.is_none() && profile_key(&resolved.canonical_name) != profile_key(name) {
        profile = profiles::get(&state.db, name).await?;
    }
    if resolved.is_empty() && profile.is_none() {
        return Err(AppError::NotFound(format!("Speaker {name} not found")));
    }

    Ok(Json(SpeakerDetailResponse {
        name: name.to_string(),
        stats: SpeakerStats::from_meetings(&resolved.meetings),
        canonical_name: resolved.canonical_name,
        linkedin: resolved.linkedin,
        profile,
        meetings: resolved.meetings,
    }))
}

/// PUT /api/speakers/:name
pub async fn handle_put(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    Json(edit): Json<ProfileEdit>,
) -> Result<Json<SpeakerProfileRow>, AppError> {
    let name = require_name(&name)?;
    let profile = profiles::apply_edit(&state.db, name, &user.user_id, edit).await?;
    info!("Profile updated for {}", name);
    Ok(Json(profile))
}

/// PATCH /api/speakers/:name
pub async fn handle_patch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<SpeakerProfileRow>, AppError> {
    let name = require_name(&name)?;
    let now = Utc::now().to_rfc3339();
    let profile = profiles::apply_patch(&state.db, name, &user.user_id, patch, &now).await?;
    info!("Profile feedback recorded for {}", name);
    Ok(Json(profile))
}

/// GET /api/speakers/:name/context
pub async fn handle_context(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<SpeakerContext>, AppError> {
    let name = require_name(&name)?;
    let resolved = resolver::resolve(&state.db, name, Some(&user.user_id)).await?;
    let ctx = extract_context(&state.llm, &state.blobs, &resolved).await?;
    Ok(Json(ctx))
}

/// POST /api/speakers/:name/enrich
pub async fn handle_enrich(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    body: Option<Json<EnrichRequest>>,
) -> Result<Json<EnrichOutcome>, AppError> {
    let name = require_name(&name)?;
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let outcome =
        enrichment::enrich_speaker(&state, name, Some(&user.user_id), req.force_refresh).await?;
    Ok(Json(outcome))
}

/// POST /api/admin/enrichment/run
pub async fn handle_run_batch(
    State(state): State<AppState>,
    _admin: AdminKey,
) -> Result<Json<BatchReport>, AppError> {
    Ok(Json(enrichment::run_batch(&state).await?))
}
