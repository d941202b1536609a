use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::topics::grouping::{group_topics, TopicGroup};
use crate::transcripts::store;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicListResponse {
    pub topics: Vec<TopicGroup>,
    pub total_meetings: usize,
}

/// GET /api/topics
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<TopicListResponse>, AppError> {
    let records = store::all_for_user(&state.db, &user.user_id).await?;
    let topics = group_topics(&records);
    Ok(Json(TopicListResponse {
        total_meetings: topics.iter().map(|t| t.count).sum(),
        topics,
    }))
}
