use anyhow::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::briefing::{BriefingRow, BriefingSummary};

const LIST_LIMIT: i64 = 30;

pub async fn insert(pool: &PgPool, user_id: &str, date: &str, summary: &BriefingSummary) -> Result<BriefingRow> {
    Ok(sqlx::query_as::<_, BriefingRow>(
        r#"
        INSERT INTO briefings (briefing_id, user_id, date, summary)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(Json(summary))
    .fetch_one(pool)
    .await?)
}

/// Newest first. With `date`, only briefings for that day.
pub async fn list_for_user(pool: &PgPool, user_id: &str, date: Option<&str>) -> Result<Vec<BriefingRow>> {
    Ok(sqlx::query_as::<_, BriefingRow>(
        r#"
        SELECT * FROM briefings
        WHERE user_id = $1 AND ($2::text IS NULL OR date = $2)
        ORDER BY date DESC, generated_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?)
}
