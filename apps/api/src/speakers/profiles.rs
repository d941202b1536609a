//! Speaker profile persistence. Profiles are keyed by lowercased name and are
//! created lazily by the first edit or enrichment.

use anyhow::Result;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::speaker::{profile_key, EnrichedData, SpeakerProfileRow};

/// PUT body: manual profile fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEdit {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
}

/// PATCH body: human verification and feedback.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub human_verified: Option<bool>,
    pub verified_full_name: Option<String>,
    pub hints: Option<String>,
    pub reject_profile_url: Option<String>,
}

/// Result of one enrichment run, ready to persist.
#[derive(Debug, Clone)]
pub struct EnrichmentRecord<'a> {
    pub display_name: &'a str,
    pub user_id: Option<&'a str>,
    pub data: &'a EnrichedData,
    pub confidence: i32,
    pub reasoning: &'a str,
    pub sources: &'a [String],
    pub enriched_at: &'a str,
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn get(pool: &PgPool, name: &str) -> Result<Option<SpeakerProfileRow>> {
    Ok(
        sqlx::query_as::<_, SpeakerProfileRow>("SELECT * FROM speaker_profiles WHERE name_key = $1")
            .bind(profile_key(name))
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn get_many(pool: &PgPool, keys: &[String]) -> Result<Vec<SpeakerProfileRow>> {
    Ok(sqlx::query_as::<_, SpeakerProfileRow>(
        "SELECT * FROM speaker_profiles WHERE name_key = ANY($1)",
    )
    .bind(keys)
    .fetch_all(pool)
    .await?)
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<SpeakerProfileRow>> {
    Ok(
        sqlx::query_as::<_, SpeakerProfileRow>("SELECT * FROM speaker_profiles ORDER BY name_key")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_missing_user_id(pool: &PgPool) -> Result<Vec<SpeakerProfileRow>> {
    Ok(sqlx::query_as::<_, SpeakerProfileRow>(
        "SELECT * FROM speaker_profiles WHERE user_id IS NULL ORDER BY name_key",
    )
    .fetch_all(pool)
    .await?)
}

pub async fn set_user_id(pool: &PgPool, name_key: &str, user_id: &str) -> Result<()> {
    sqlx::query("UPDATE speaker_profiles SET user_id = $2, updated_at = NOW() WHERE name_key = $1")
        .bind(name_key)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Creates or updates the profile with the provided manual fields. Omitted
/// fields keep their stored values.
pub async fn apply_edit(
    pool: &PgPool,
    name: &str,
    user_id: &str,
    edit: ProfileEdit,
) -> Result<SpeakerProfileRow> {
    let display_name = blank_to_none(edit.display_name).unwrap_or_else(|| name.trim().to_string());

    Ok(sqlx::query_as::<_, SpeakerProfileRow>(
        r#"
        INSERT INTO speaker_profiles (name_key, user_id, display_name, bio, linkedin, company, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (name_key) DO UPDATE SET
            user_id = COALESCE(speaker_profiles.user_id, EXCLUDED.user_id),
            display_name = EXCLUDED.display_name,
            bio = COALESCE(EXCLUDED.bio, speaker_profiles.bio),
            linkedin = COALESCE(EXCLUDED.linkedin, speaker_profiles.linkedin),
            company = COALESCE(EXCLUDED.company, speaker_profiles.company),
            role = COALESCE(EXCLUDED.role, speaker_profiles.role),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(profile_key(name))
    .bind(user_id)
    .bind(display_name)
    .bind(blank_to_none(edit.bio))
    .bind(blank_to_none(edit.linkedin))
    .bind(blank_to_none(edit.company))
    .bind(blank_to_none(edit.role))
    .fetch_one(pool)
    .await?)
}

/// Applies verification, hints and rejections. Rejecting the stored LinkedIn
/// URL also clears it.
pub async fn apply_patch(
    pool: &PgPool,
    name: &str,
    user_id: &str,
    patch: ProfilePatch,
    now: &str,
) -> Result<SpeakerProfileRow> {
    let key = profile_key(name);
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO speaker_profiles (name_key, user_id, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (name_key) DO NOTHING
        "#,
    )
    .bind(&key)
    .bind(user_id)
    .bind(name.trim())
    .execute(&mut *tx)
    .await?;

    let verified_at = patch.human_verified.filter(|v| *v).map(|_| now.to_string());
    let reject = blank_to_none(patch.reject_profile_url);

    let row = sqlx::query_as::<_, SpeakerProfileRow>(
        r#"
        UPDATE speaker_profiles SET
            human_verified = COALESCE($2, human_verified),
            human_verified_at = CASE
                WHEN $2 IS TRUE THEN $3
                WHEN $2 IS FALSE THEN NULL
                ELSE human_verified_at END,
            verified_full_name = COALESCE($4, verified_full_name),
            human_hints = COALESCE($5, human_hints),
            rejected_profiles = CASE
                WHEN $6::text IS NULL OR $6 = ANY(rejected_profiles) THEN rejected_profiles
                ELSE array_append(rejected_profiles, $6) END,
            linkedin = CASE WHEN linkedin = $6 THEN NULL ELSE linkedin END,
            enriched_data = CASE
                WHEN enriched_data->>'linkedinUrl' = $6 THEN enriched_data - 'linkedinUrl'
                ELSE enriched_data END,
            updated_at = NOW()
        WHERE name_key = $1
        RETURNING *
        "#,
    )
    .bind(&key)
    .bind(patch.human_verified)
    .bind(verified_at)
    .bind(blank_to_none(patch.verified_full_name))
    .bind(blank_to_none(patch.hints))
    .bind(reject)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Persists an enrichment run. On human-verified profiles the stored role,
/// company and LinkedIn URL are kept and only filled when empty.
pub async fn save_enrichment(pool: &PgPool, record: &EnrichmentRecord<'_>) -> Result<SpeakerProfileRow> {
    let data = record.data;

    Ok(sqlx::query_as::<_, SpeakerProfileRow>(
        r#"
        INSERT INTO speaker_profiles
            (name_key, user_id, display_name, enriched_data, enriched_confidence,
             enriched_reasoning, enriched_sources, web_enriched_at, enriched_at,
             role, company, linkedin, ai_summary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10, $11, $12)
        ON CONFLICT (name_key) DO UPDATE SET
            user_id = COALESCE(speaker_profiles.user_id, EXCLUDED.user_id),
            enriched_data = EXCLUDED.enriched_data,
            enriched_confidence = EXCLUDED.enriched_confidence,
            enriched_reasoning = EXCLUDED.enriched_reasoning,
            enriched_sources = EXCLUDED.enriched_sources,
            web_enriched_at = EXCLUDED.web_enriched_at,
            enriched_at = EXCLUDED.enriched_at,
            ai_summary = COALESCE(EXCLUDED.ai_summary, speaker_profiles.ai_summary),
            role = CASE WHEN speaker_profiles.human_verified
                THEN COALESCE(speaker_profiles.role, EXCLUDED.role)
                ELSE COALESCE(EXCLUDED.role, speaker_profiles.role) END,
            company = CASE WHEN speaker_profiles.human_verified
                THEN COALESCE(speaker_profiles.company, EXCLUDED.company)
                ELSE COALESCE(EXCLUDED.company, speaker_profiles.company) END,
            linkedin = CASE WHEN speaker_profiles.human_verified
                THEN COALESCE(speaker_profiles.linkedin, EXCLUDED.linkedin)
                ELSE COALESCE(EXCLUDED.linkedin, speaker_profiles.linkedin) END,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(profile_key(record.display_name))
    .bind(record.user_id)
    .bind(record.display_name.trim())
    .bind(Json(data))
    .bind(record.confidence)
    .bind(record.reasoning)
    .bind(record.sources)
    .bind(record.enriched_at)
    .bind(non_empty(&data.title))
    .bind(non_empty(&data.company))
    .bind(data.linkedin_url.as_deref())
    .bind(non_empty(&data.summary))
    .fetch_one(pool)
    .await?)
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_treated_as_absent() {
        assert_eq!(blank_to_none(Some("  ".into())), None);
        assert_eq!(blank_to_none(Some(" CTO ".into())).as_deref(), Some("CTO"));
    }

    #[test]
    fn test_patch_body_parses() {
        let p: ProfilePatch = serde_json::from_str(
            r#"{"humanVerified":true,"rejectProfileUrl":"https://www.linkedin.com/in/wrong"}"#,
        )
        .unwrap();
        assert_eq!(p.human_verified, Some(true));
        assert!(p.hints.is_none());
    }
}
