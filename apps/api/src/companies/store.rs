use anyhow::Result;
use sqlx::PgPool;

use crate::companies::extraction::{company_id, ExtractedCompany};
use crate::models::company::CompanyRow;

/// Records one meeting's mentions. Existing companies get their count bumped,
/// a higher confidence, and a known type replacing `unknown`.
pub async fn record_mentions(
    pool: &PgPool,
    user_id: &str,
    meeting_id: &str,
    date: &str,
    found: &[ExtractedCompany],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for company in found {
        sqlx::query(
            r#"
            INSERT INTO companies
                (id, user_id, name, company_type, confidence, mention_count, last_mentioned, transcript_mentions)
            VALUES ($1, $2, $3, $4, $5, 1, $6, ARRAY[$7])
            ON CONFLICT (user_id, id) DO UPDATE SET
                mention_count = CASE
                    WHEN $7 = ANY(companies.transcript_mentions) THEN companies.mention_count
                    ELSE companies.mention_count + 1 END,
                last_mentioned = GREATEST(companies.last_mentioned, EXCLUDED.last_mentioned),
                confidence = GREATEST(companies.confidence, EXCLUDED.confidence),
                company_type = CASE
                    WHEN companies.company_type = 'unknown' THEN EXCLUDED.company_type
                    ELSE companies.company_type END,
                transcript_mentions = CASE
                    WHEN $7 = ANY(companies.transcript_mentions) THEN companies.transcript_mentions
                    ELSE array_append(companies.transcript_mentions, $7) END
            "#,
        )
        .bind(company_id(&company.name))
        .bind(user_id)
        .bind(&company.name)
        .bind(&company.company_type)
        .bind(company.confidence)
        .bind(date)
        .bind(meeting_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<CompanyRow>> {
    Ok(sqlx::query_as::<_, CompanyRow>(
        r#"
        SELECT * FROM companies
        WHERE user_id = $1
        ORDER BY mention_count DESC, last_mentioned DESC, name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}
