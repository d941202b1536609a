//! Loose identity graph: speaker and company nodes with `works_at` edges.
//!
//! A projection of enrichment results, written best-effort. Nodes are matched
//! by canonical name before insert, so spelling variants that canonicalize
//! differently become separate nodes.

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::entity::{EntityRow, RelationshipRow};
use crate::models::speaker::EnrichedData;

pub const SPEAKER: &str = "speaker";
pub const COMPANY: &str = "company";
pub const WORKS_AT: &str = "works_at";

/// Lowercase, keep `[a-z0-9]` and spaces, collapse whitespace.
pub fn canonicalize(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub async fn find(
    pool: &PgPool,
    user_id: &str,
    entity_type: &str,
    name: &str,
) -> Result<Option<EntityRow>> {
    Ok(sqlx::query_as::<_, EntityRow>(
        r#"
        SELECT * FROM entities
        WHERE entity_type = $1 AND canonical_name = $2 AND user_id = $3
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(entity_type)
    .bind(canonicalize(name))
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

async fn insert(pool: &PgPool, user_id: &str, entity_type: &str, name: &str, metadata: Value) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO entities (entity_id, user_id, entity_type, name, canonical_name, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(entity_type)
    .bind(name.trim())
    .bind(canonicalize(name))
    .bind(metadata)
    .execute(pool)
    .await?;
    Ok(id)
}

fn speaker_metadata(data: &EnrichedData) -> Value {
    json!({
        "linkedin": data.linkedin_url,
        "role": data.title,
        "company_name": data.company,
        "bio": data.summary,
    })
}

/// Finds or creates the speaker node and merges enrichment into its metadata.
pub async fn upsert_speaker(
    pool: &PgPool,
    user_id: &str,
    name: &str,
    data: &EnrichedData,
    confidence: i32,
    source: &str,
) -> Result<Uuid> {
    let id = match find(pool, user_id, SPEAKER, name).await? {
        Some(existing) => existing.entity_id,
        None => insert(pool, user_id, SPEAKER, name, json!({})).await?,
    };

    sqlx::query(
        r#"
        UPDATE entities SET
            metadata = metadata || $2,
            confidence = $3,
            enrichment_source = $4,
            enriched_at = NOW(),
            updated_at = NOW()
        WHERE entity_id = $1
        "#,
    )
    .bind(id)
    .bind(speaker_metadata(data))
    .bind(confidence)
    .bind(source)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn upsert_company(pool: &PgPool, user_id: &str, name: &str) -> Result<Uuid> {
    if let Some(existing) = find(pool, user_id, COMPANY, name).await? {
        return Ok(existing.entity_id);
    }
    insert(pool, user_id, COMPANY, name, json!({})).await
}

/// Adds a `works_at` edge unless one already exists.
pub async fn link_works_at(pool: &PgPool, user_id: &str, person: Uuid, company: Uuid) -> Result<()> {
    let existing: Option<RelationshipRow> = sqlx::query_as(
        r#"
        SELECT * FROM relationships
        WHERE from_entity_id = $1 AND to_entity_id = $2 AND relationship_type = $3
        LIMIT 1
        "#,
    )
    .bind(person)
    .bind(company)
    .bind(WORKS_AT)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO relationships (relationship_id, user_id, from_entity_id, to_entity_id, relationship_type)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(person)
    .bind(company)
    .bind(WORKS_AT)
    .execute(pool)
    .await?;
    Ok(())
}

/// Projects an enrichment result into the graph.
pub async fn record_enrichment(
    pool: &PgPool,
    user_id: &str,
    name: &str,
    data: &EnrichedData,
    confidence: i32,
    source: &str,
) -> Result<()> {
    let person = upsert_speaker(pool, user_id, name, data, confidence, source).await?;
    let company = data.company.trim();
    if !company.is_empty() {
        let org = upsert_company(pool, user_id, company).await?;
        link_works_at(pool, user_id, person, org).await?;
    }
    debug!("Entity graph updated for {}", name);
    Ok(())
}
