use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::transcript::TranscriptRow;
use crate::search::vectors::{self, rank_meetings, MeetingHit};
use crate::state::AppState;
use crate::transcripts::store;

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub meeting_id: String,
    pub title: String,
    pub topic: Option<String>,
    pub date: String,
    pub speakers: Vec<String>,
    pub snippet: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: &'static str,
    pub results: Vec<SearchHit>,
}

/// Case-insensitive title/topic match, newest first.
pub fn keyword_matches(records: &[TranscriptRow], query: &str, limit: usize) -> Vec<SearchHit> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.title.to_lowercase().contains(&needle)
                || r.topic.as_deref().is_some_and(|t| t.to_lowercase().contains(&needle))
        })
        .take(limit)
        .map(|r| SearchHit {
            meeting_id: r.meeting_id.clone(),
            title: r.title.clone(),
            topic: r.topic.clone(),
            date: r.date.clone(),
            speakers: r.display_speakers(),
            snippet: r.topic.clone().unwrap_or_default(),
            score: 1.0,
        })
        .collect()
}

/// Joins vector hits with index rows; hits for meetings no longer indexed are dropped.
fn attach_metadata(hits: Vec<MeetingHit>, records: Vec<TranscriptRow>) -> Vec<SearchHit> {
    let mut by_id: HashMap<String, TranscriptRow> = records
        .into_iter()
        .map(|r| (r.meeting_id.clone(), r))
        .collect();
    hits.into_iter()
        .filter_map(|hit| {
            let row = by_id.remove(&hit.meeting_id)?;
            Some(SearchHit {
                speakers: row.display_speakers(),
                meeting_id: hit.meeting_id,
                title: row.title,
                topic: row.topic,
                date: row.date,
                snippet: hit.snippet,
                score: hit.score,
            })
        })
        .collect()
}

/// GET /api/search
pub async fn handle_search(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = q.q.as_deref().map(str::trim).unwrap_or_default().to_string();
    if query.is_empty() {
        return Err(AppError::Validation("q is required".into()));
    }
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let Some(embedder) = &state.embedder else {
        let records = store::all_for_user(&state.db, &user.user_id).await?;
        let results = keyword_matches(&records, &query, limit);
        return Ok(Json(SearchResponse {
            query,
            mode: "keyword",
            results,
        }));
    };

    let query_vector = embedder
        .embed_one(&query)
        .await
        .map_err(|e| AppError::Search(e.to_string()))?;
    let chunks = vectors::chunks_visible_to(&state.db, &user.user_id).await?;
    let hits = rank_meetings(&query_vector, &chunks, limit);

    let ids: Vec<String> = hits.iter().map(|h| h.meeting_id.clone()).collect();
    let records = store::batch_get(&state.db, &ids).await?;
    if records.len() < ids.len() {
        warn!("{} search hit(s) have no index row", ids.len() - records.len());
    }
    let results = attach_metadata(hits, records);
    info!("Search '{}' returned {} result(s)", query, results.len());

    Ok(Json(SearchResponse {
        query,
        mode: "semantic",
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matches_title_and_topic() {
        let mut a = TranscriptRow::fixture("m1", Some("u"), &[]);
        a.title = "Pricing review".into();
        let mut b = TranscriptRow::fixture("m2", Some("u"), &[]);
        b.topic = Some("Roadmap - pricing tiers".into());
        let c = TranscriptRow::fixture("m3", Some("u"), &[]);

        let hits = keyword_matches(&[a, b, c], "PRICING", 10);
        let ids: Vec<_> = hits.iter().map(|h| h.meeting_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn test_attach_metadata_keeps_rank_order() {
        let hits = vec![
            MeetingHit {
                meeting_id: "m2".into(),
                score: 0.9,
                snippet: "budget".into(),
                chunk_index: 0,
            },
            MeetingHit {
                meeting_id: "gone".into(),
                score: 0.8,
                snippet: String::new(),
                chunk_index: 0,
            },
            MeetingHit {
                meeting_id: "m1".into(),
                score: 0.5,
                snippet: "hiring".into(),
                chunk_index: 3,
            },
        ];
        let records = vec![
            TranscriptRow::fixture("m1", Some("u"), &["Jane"]),
            TranscriptRow::fixture("m2", Some("u"), &[]),
        ];
        let out = attach_metadata(hits, records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].meeting_id, "m2");
        assert_eq!(out[1].speakers, vec!["Jane"]);
    }
}
