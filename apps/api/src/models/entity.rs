use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntityRow {
    pub entity_id: Uuid,
    pub user_id: String,
    pub entity_type: String,
    pub name: String,
    pub canonical_name: String,
    pub metadata: Value,
    pub confidence: Option<i32>,
    pub enrichment_source: Option<String>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRow {
    pub relationship_id: Uuid,
    pub user_id: String,
    pub from_entity_id: Uuid,
    pub to_entity_id: Uuid,
    pub relationship_type: String,
    pub created_at: DateTime<Utc>,
}
