use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub company_type: String,
    pub confidence: i32,
    pub mention_count: i32,
    pub last_mentioned: String,
    pub transcript_mentions: Vec<String>,
    pub created_at: DateTime<Utc>,
}
