use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AdminKey, AuthUser};
use crate::briefings::generator::{self, BriefingRunReport};
use crate::briefings::store;
use crate::errors::AppError;
use crate::models::briefing::BriefingRow;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBriefingRequest {
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct ListBriefingsQuery {
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct BriefingListResponse {
    pub briefings: Vec<BriefingRow>,
}

/// POST /api/briefings
pub async fn handle_generate(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<GenerateBriefingRequest>>,
) -> Result<Json<BriefingRow>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let date = req
        .date
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(generator::default_briefing_date);
    let briefing = generator::generate_for_user(&state, &user.user_id, &date).await?;
    Ok(Json(briefing))
}

/// GET /api/briefings
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ListBriefingsQuery>,
) -> Result<Json<BriefingListResponse>, AppError> {
    let date = match q.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => Some(generator::parse_briefing_date(raw)?.format("%Y-%m-%d").to_string()),
        None => None,
    };
    let briefings = store::list_for_user(&state.db, &user.user_id, date.as_deref()).await?;
    Ok(Json(BriefingListResponse { briefings }))
}

/// POST /api/admin/briefings/run
pub async fn handle_run_all(
    State(state): State<AppState>,
    _admin: AdminKey,
) -> Result<Json<BriefingRunReport>, AppError> {
    Ok(Json(generator::run_for_all_users(&state).await?))
}
