//! Speaker enrichment pipeline.
//!
//! cache gate -> lock -> resolve -> context -> search -> validate -> select ->
//! extract -> persist -> entity projection.

use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::entities;
use crate::errors::AppError;
use crate::models::speaker::{profile_key, EnrichedData, SpeakerProfileRow};
use crate::models::transcript::is_real_speaker_name;
use crate::speakers::context::{extract_context, SpeakerContext};
use crate::speakers::lock::EnrichmentLock;
use crate::speakers::profiles::{self, EnrichmentRecord};
use crate::speakers::resolver;
use crate::speakers::validation::{
    context_only_summary, drop_rejected, extract_profile, fields_from_snippet, select_best,
    validate_candidates, CandidateReport,
};
use crate::state::AppState;
use crate::transcripts::ingest::parse_timestamp;

pub const CACHE_DAYS: i64 = 14;
pub const MAX_ENRICHMENTS_PER_RUN: usize = 50;
pub const SEARCH_DELAY: StdDuration = StdDuration::from_secs(2);
pub const MIN_HOURS_BETWEEN_ENRICHMENTS: i64 = 24;
pub const LOW_CONFIDENCE_THRESHOLD: i32 = 70;

const ENTITY_SOURCE_MANUAL: &str = "on_demand_enrichment";
const ENTITY_SOURCE_BATCH: &str = "batch_enrichment";

/// On-demand runs always store a result. Batch runs leave the stored profile
/// untouched when no search result is good enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    OnDemand,
    Batch,
}

impl EnrichMode {
    fn entity_source(self) -> &'static str {
        match self {
            Self::OnDemand => ENTITY_SOURCE_MANUAL,
            Self::Batch => ENTITY_SOURCE_BATCH,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichOutcome {
    pub cached: bool,
    pub profile: SpeakerProfileRow,
    pub enriched_data: Option<EnrichedData>,
    pub confidence: Option<i32>,
    pub reasoning: Option<String>,
    pub sources: Vec<String>,
    pub search_query: Option<String>,
    pub context: Option<SpeakerContext>,
    pub candidates: Vec<CandidateReport>,
}

impl EnrichOutcome {
    fn cached(profile: SpeakerProfileRow) -> Self {
        Self {
            cached: true,
            enriched_data: profile.enriched().cloned(),
            confidence: profile.enriched_confidence,
            reasoning: profile.enriched_reasoning.clone(),
            sources: profile.enriched_sources.clone(),
            search_query: None,
            context: None,
            candidates: Vec::new(),
            profile,
        }
    }
}

/// A profile is served from cache when it carries enrichment data written
/// less than [`CACHE_DAYS`] ago.
pub fn is_cache_fresh(profile: &SpeakerProfileRow, now: DateTime<Utc>) -> bool {
    let has_data = profile.enriched().is_some_and(|d| !d.is_empty());
    let fresh = profile
        .web_enriched_at
        .as_deref()
        .and_then(parse_timestamp)
        .is_some_and(|at| now - at < Duration::days(CACHE_DAYS));
    has_data && fresh
}

/// `name company role hints LinkedIn`, skipping missing parts.
pub fn build_search_query(name: &str, ctx: &SpeakerContext, hints: Option<&str>) -> String {
    let mut terms = vec![name.trim().to_string()];
    if let Some(company) = ctx.companies.first() {
        terms.push(company.clone());
    }
    if let Some(role) = ctx.role_hints.first() {
        terms.push(role.clone());
    }
    if let Some(h) = hints.map(str::trim).filter(|h| !h.is_empty()) {
        terms.push(h.to_string());
    }
    terms.push("LinkedIn".to_string());
    terms.join(" ")
}

/// What gets stored when no search result was selected: a summary built from
/// meeting context with confidence 0, or nothing for batch runs.
pub fn fallback_enrichment(mode: EnrichMode, ctx: &SpeakerContext) -> Option<(EnrichedData, i32, String)> {
    match mode {
        EnrichMode::OnDemand => Some((
            context_only_summary(ctx),
            0,
            "No search result matched the meeting context closely enough".to_string(),
        )),
        EnrichMode::Batch => None,
    }
}

/// Enriches one speaker on demand.
pub async fn enrich_speaker(
    state: &AppState,
    name: &str,
    user_id: Option<&str>,
    force_refresh: bool,
) -> Result<EnrichOutcome, AppError> {
    if profile_key(name).is_empty() {
        return Err(AppError::Validation("Speaker name is required".into()));
    }
    let existing = profiles::get(&state.db, name).await?;
    enrich_loaded(state, name, user_id, existing, force_refresh, EnrichMode::OnDemand)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Enrichment of {name} stored nothing")))
}

/// Enriches a speaker whose profile is already loaded. `user_id = None`
/// resolves across all users (batch runs for profiles with no owner).
/// Returns `None` when a batch run found nothing worth storing.
pub async fn enrich_loaded(
    state: &AppState,
    name: &str,
    user_id: Option<&str>,
    existing: Option<SpeakerProfileRow>,
    force_refresh: bool,
    mode: EnrichMode,
) -> Result<Option<EnrichOutcome>, AppError> {
    let key = profile_key(name);
    if key.is_empty() {
        return Err(AppError::Validation("Speaker name is required".into()));
    }

    if !force_refresh {
        if let Some(profile) = existing.as_ref().filter(|p| is_cache_fresh(p, Utc::now())) {
            info!("Serving cached enrichment for {}", name);
            return Ok(Some(EnrichOutcome::cached(profile.clone())));
        }
    }

    let lock = EnrichmentLock::acquire(&state.redis, &key)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Enrichment already running for {name}")))?;

    let result = run_pipeline(state, name, user_id, existing.as_ref(), mode).await;
    lock.release(&state.redis).await;
    result
}

async fn run_pipeline(
    state: &AppState,
    name: &str,
    user_id: Option<&str>,
    existing: Option<&SpeakerProfileRow>,
    mode: EnrichMode,
) -> Result<Option<EnrichOutcome>, AppError> {
    let resolved = resolver::resolve(&state.db, name, user_id).await?;
    if resolved.is_empty() {
        return Err(AppError::NotFound(format!("No meetings found for {name}")));
    }

    let ctx = extract_context(&state.llm, &state.blobs, &resolved).await?;
    let hints = existing.and_then(|p| p.human_hints.as_deref());
    let search_name = existing
        .map(|p| p.canonical_name())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&resolved.canonical_name);
    let query = build_search_query(search_name, &ctx, hints);

    let results = state
        .web_search
        .search(&query)
        .await
        .map_err(|e| AppError::Search(e.to_string()))?;
    let rejected = existing.map(|p| p.rejected_profiles.as_slice()).unwrap_or(&[]);
    let results = drop_rejected(results, rejected);

    let (scored, candidates) = validate_candidates(&state.llm, &ctx, &results, hints).await;

    let (data, confidence, reasoning, sources) = match select_best(&scored) {
        Some(best) => {
            let data = match extract_profile(&state.llm, &ctx, &best.result).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Profile extraction failed for {}: {e}", name);
                    fields_from_snippet(&best.result)
                }
            };
            (data, best.confidence, best.reasoning.clone(), vec![best.result.url.clone()])
        }
        None => match fallback_enrichment(mode, &ctx) {
            Some((data, confidence, reasoning)) => {
                info!("No candidate for {} reached the threshold; using meeting context", name);
                (data, confidence, reasoning, Vec::new())
            }
            None => {
                info!("No candidate for {} reached the threshold; keeping stored profile", name);
                return Ok(None);
            }
        },
    };

    let now = Utc::now().to_rfc3339();
    let owner = user_id.or_else(|| existing.and_then(|p| p.user_id.as_deref()));
    let profile = profiles::save_enrichment(
        &state.db,
        &EnrichmentRecord {
            display_name: name,
            user_id: owner,
            data: &data,
            confidence,
            reasoning: &reasoning,
            sources: &sources,
            enriched_at: &now,
        },
    )
    .await?;

    if let Some(owner) = owner {
        let recorded = entities::record_enrichment(
            &state.db,
            owner,
            &resolved.canonical_name,
            &data,
            confidence,
            mode.entity_source(),
        )
        .await;
        if let Err(e) = recorded {
            warn!("Entity update failed for {}: {e}", name);
        }
    }

    info!(
        "Enriched {} (confidence {}, {} source(s))",
        name,
        confidence,
        sources.len()
    );

    Ok(Some(EnrichOutcome {
        cached: false,
        profile,
        enriched_data: Some(data),
        confidence: Some(confidence),
        reasoning: Some(reasoning),
        sources,
        search_query: Some(query),
        context: Some(ctx),
        candidates,
    }))
}

// ──────────────────────────────────────────────────────────────
// Nightly batch
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchPriority {
    Unenriched,
    LowConfidence,
    Stale,
}

/// Why a profile needs enrichment, or `None` if it does not.
pub fn batch_priority(profile: &SpeakerProfileRow, now: DateTime<Utc>) -> Option<BatchPriority> {
    if !is_real_speaker_name(&profile.display_name) || profile.human_verified {
        return None;
    }
    let Some(last) = profile.web_enriched_at.as_deref().and_then(parse_timestamp) else {
        return Some(BatchPriority::Unenriched);
    };
    if profile.enriched_confidence.unwrap_or(0) < LOW_CONFIDENCE_THRESHOLD {
        return Some(BatchPriority::LowConfidence);
    }
    (now - last > Duration::days(CACHE_DAYS)).then_some(BatchPriority::Stale)
}

/// Candidates ordered unenriched, low confidence, stale; capped per run.
pub fn select_batch(profiles: &[SpeakerProfileRow], now: DateTime<Utc>) -> Vec<&SpeakerProfileRow> {
    let mut ranked: Vec<(BatchPriority, &SpeakerProfileRow)> = profiles
        .iter()
        .filter_map(|p| batch_priority(p, now).map(|prio| (prio, p)))
        .collect();
    ranked.sort_by_key(|(prio, _)| *prio);
    ranked
        .into_iter()
        .take(MAX_ENRICHMENTS_PER_RUN)
        .map(|(_, p)| p)
        .collect()
}

/// True when the profile was enriched within the last 24 hours.
pub fn enriched_recently(profile: &SpeakerProfileRow, now: DateTime<Utc>) -> bool {
    profile
        .web_enriched_at
        .as_deref()
        .and_then(parse_timestamp)
        .is_some_and(|at| now - at < Duration::hours(MIN_HOURS_BETWEEN_ENRICHMENTS))
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub candidates: usize,
    pub processed: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
}

/// POST /api/admin/enrichment/run pipeline.
pub async fn run_batch(state: &AppState) -> Result<BatchReport, AppError> {
    let started = Instant::now();
    let now = Utc::now();
    let all = profiles::list_all(&state.db).await?;
    let batch = select_batch(&all, now);
    let mut report = BatchReport {
        candidates: batch.len(),
        ..Default::default()
    };
    info!("Enrichment batch: {} candidate(s) of {} profiles", batch.len(), all.len());

    for profile in batch {
        let name = profile.display_name.as_str();
        if enriched_recently(profile, now) {
            report.skipped += 1;
            continue;
        }

        report.processed += 1;
        let outcome = enrich_loaded(
            state,
            name,
            profile.user_id.as_deref(),
            Some(profile.clone()),
            true,
            EnrichMode::Batch,
        )
        .await;
        match outcome {
            Ok(Some(o)) if !o.sources.is_empty() => report.enriched += 1,
            Ok(_) => info!("No web match for {}", name),
            Err(AppError::Conflict(_)) => report.skipped += 1,
            Err(e) => {
                warn!("Batch enrichment failed for {}: {e}", name);
                report.errors.push(format!("{name}: {e}"));
            }
        }

        tokio::time::sleep(SEARCH_DELAY).await;
    }

    report.duration_seconds = started.elapsed().as_secs_f64();
    info!(
        "Enrichment batch done: {} processed, {} enriched, {} skipped, {} errors",
        report.processed,
        report.enriched,
        report.skipped,
        report.errors.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use sqlx::types::Json;

    use crate::speakers::web_search::{SearchError, SearchResult, WebSearch};

    struct NoSearch;

    #[async_trait]
    impl WebSearch for NoSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
            panic!("web search ran for a cached profile: {query}");
        }
    }

    fn now() -> DateTime<Utc> {
        parse_timestamp("2025-06-15T12:00:00Z").unwrap()
    }

    fn enriched(name: &str, days_ago: i64, confidence: i32) -> SpeakerProfileRow {
        let mut p = SpeakerProfileRow::fixture(name);
        p.web_enriched_at = Some((now() - Duration::days(days_ago)).to_rfc3339());
        p.enriched_confidence = Some(confidence);
        p.enriched_data = Some(Json(EnrichedData {
            company: "Acme".into(),
            ..Default::default()
        }));
        p
    }

    #[test]
    fn test_cache_fresh_within_window() {
        assert!(is_cache_fresh(&enriched("Jane", 3, 80), now()));
        assert!(!is_cache_fresh(&enriched("Jane", 15, 80), now()));
    }

    #[test]
    fn test_cache_requires_data() {
        let mut p = enriched("Jane", 1, 80);
        p.enriched_data = Some(Json(EnrichedData::default()));
        assert!(!is_cache_fresh(&p, now()));
        p.enriched_data = None;
        assert!(!is_cache_fresh(&p, now()));
    }

    #[test]
    fn test_search_query_terms() {
        let ctx = SpeakerContext {
            companies: vec!["Acme".into(), "Globex".into()],
            role_hints: vec!["CTO".into()],
            ..Default::default()
        };
        assert_eq!(
            build_search_query("Jane Doe", &ctx, Some(" Berlin ")),
            "Jane Doe Acme CTO Berlin LinkedIn"
        );
        assert_eq!(
            build_search_query("Jane Doe", &SpeakerContext::default(), None),
            "Jane Doe LinkedIn"
        );
    }

    #[test]
    fn test_batch_priority_rules() {
        assert_eq!(
            batch_priority(&SpeakerProfileRow::fixture("Jane"), now()),
            Some(BatchPriority::Unenriched)
        );
        assert_eq!(batch_priority(&enriched("Jane", 2, 40), now()), Some(BatchPriority::LowConfidence));
        assert_eq!(batch_priority(&enriched("Jane", 20, 90), now()), Some(BatchPriority::Stale));
        assert_eq!(batch_priority(&enriched("Jane", 2, 90), now()), None);
        assert_eq!(batch_priority(&SpeakerProfileRow::fixture("Speaker 4"), now()), None);

        let mut verified = SpeakerProfileRow::fixture("Jane");
        verified.human_verified = true;
        assert_eq!(batch_priority(&verified, now()), None);
    }

    #[test]
    fn test_select_batch_orders_by_priority() {
        let profiles = vec![
            enriched("Stale Sam", 30, 90),
            enriched("Low Lee", 2, 10),
            SpeakerProfileRow::fixture("New Nia"),
        ];
        let names: Vec<_> = select_batch(&profiles, now())
            .iter()
            .map(|p| p.display_name.clone())
            .collect();
        assert_eq!(names, vec!["New Nia", "Low Lee", "Stale Sam"]);
    }

    #[test]
    fn test_select_batch_capped() {
        let profiles: Vec<_> = (0..60)
            .map(|i| SpeakerProfileRow::fixture(&format!("Person {i}")))
            .collect();
        assert_eq!(select_batch(&profiles, now()).len(), MAX_ENRICHMENTS_PER_RUN);
    }

    #[test]
    fn test_enriched_recently() {
        assert!(enriched_recently(&enriched("Jane", 0, 10), now()));
        assert!(!enriched_recently(&enriched("Jane", 2, 10), now()));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_web_search() {
        let mut state = AppState::for_tests();
        state.web_search = Arc::new(NoSearch);

        let mut profile = enriched("Jane Doe", 0, 80);
        profile.web_enriched_at = Some((Utc::now() - Duration::days(1)).to_rfc3339());

        let out = enrich_loaded(
            &state,
            "Jane Doe",
            Some("u1"),
            Some(profile),
            false,
            EnrichMode::OnDemand,
        )
        .await
        .unwrap()
        .unwrap();
        assert!(out.cached);
        assert_eq!(out.confidence, Some(80));
        assert!(out.search_query.is_none());
    }

    #[test]
    fn test_batch_keeps_stored_profile_without_a_match() {
        let ctx = SpeakerContext {
            name: "Jane Doe".into(),
            meeting_count: 3,
            ..Default::default()
        };
        assert!(fallback_enrichment(EnrichMode::Batch, &ctx).is_none());

        let (data, confidence, _) = fallback_enrichment(EnrichMode::OnDemand, &ctx).unwrap();
        assert_eq!(confidence, 0);
        assert!(!data.is_empty());
    }
}
