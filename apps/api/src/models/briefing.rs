use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub text: String,
    #[serde(default)]
    pub meeting: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub topic: String,
    #[serde(default)]
    pub meetings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalCorrelation {
    pub topic: String,
    #[serde(default)]
    pub meetings: Vec<String>,
    #[serde(default)]
    pub insight: String,
}

/// Narrative summary stored with each briefing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefingSummary {
    pub narrative: String,
    pub meeting_count: usize,
    #[serde(default)]
    pub key_themes: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub meeting_summaries: Vec<MeetingSummary>,
    #[serde(default)]
    pub historical_correlations: Vec<HistoricalCorrelation>,
    #[serde(default)]
    pub total_duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BriefingRow {
    pub briefing_id: Uuid,
    pub user_id: String,
    pub date: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Json<BriefingSummary>,
}
