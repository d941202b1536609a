//! Scores web search candidates against a speaker's meeting context and turns
//! the winner into profile fields.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{CallOptions, LlmClient, LlmError};
use crate::models::speaker::EnrichedData;
use crate::speakers::context::SpeakerContext;
use crate::speakers::prompts::{PROFILE_EXTRACT_PROMPT, VALIDATION_PROMPT};
use crate::speakers::web_search::{is_company_page, is_personal_linkedin, SearchResult};

/// Candidates scored per enrichment.
pub const MAX_VALIDATED: usize = 3;
/// Minimum score for a candidate to back the profile.
pub const MIN_CONFIDENCE: i32 = 30;

const VALIDATION_OPTIONS: CallOptions = CallOptions::new(300, 0.2);
const EXTRACT_OPTIONS: CallOptions = CallOptions::new(400, 0.3);

#[derive(Debug, Deserialize)]
struct RawValidation {
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    red_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub result: SearchResult,
    pub confidence: i32,
    pub reasoning: String,
    pub red_flags: Vec<String>,
}

/// Per-candidate outcome, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub url: String,
    pub title: String,
    pub confidence: Option<i32>,
    pub reasoning: Option<String>,
    pub red_flags: Vec<String>,
    pub error: Option<String>,
}

impl From<&ScoredCandidate> for CandidateReport {
    fn from(c: &ScoredCandidate) -> Self {
        Self {
            url: c.result.url.clone(),
            title: c.result.title.clone(),
            confidence: Some(c.confidence),
            reasoning: Some(c.reasoning.clone()),
            red_flags: c.red_flags.clone(),
            error: None,
        }
    }
}

fn hints_line(hints: Option<&str>) -> String {
    match hints.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => format!("- Notes from the user: {h}\n"),
        None => String::new(),
    }
}

fn or_unknown(items: &[String]) -> String {
    if items.is_empty() {
        "Unknown".to_string()
    } else {
        items.join(", ")
    }
}

fn validation_prompt(ctx: &SpeakerContext, result: &SearchResult, hints: Option<&str>) -> String {
    VALIDATION_PROMPT
        .replace("{name}", &ctx.name)
        .replace("{companies}", &or_unknown(&ctx.companies))
        .replace("{topics}", &or_unknown(&ctx.topics))
        .replace("{role_hints}", &or_unknown(&ctx.role_hints))
        .replace("{meeting_count}", &ctx.meeting_count.to_string())
        .replace("{hints}", &hints_line(hints))
        .replace("{title}", &result.title)
        .replace("{url}", &result.url)
        .replace("{snippet}", &result.snippet)
}

/// Asks the model how well one result matches the context.
pub async fn score_candidate(
    llm: &LlmClient,
    ctx: &SpeakerContext,
    result: &SearchResult,
    hints: Option<&str>,
) -> Result<ScoredCandidate, LlmError> {
    let prompt = validation_prompt(ctx, result, hints);
    let raw: RawValidation = llm.call_json(&prompt, JSON_ONLY_SYSTEM, VALIDATION_OPTIONS).await?;
    Ok(ScoredCandidate {
        result: result.clone(),
        confidence: raw.confidence.clamp(0.0, 100.0) as i32,
        reasoning: raw.reasoning,
        red_flags: raw.red_flags,
    })
}

/// Scores up to [`MAX_VALIDATED`] results in order. A failed score excludes that
/// candidate and is reported; it does not abort the others.
pub async fn validate_candidates(
    llm: &LlmClient,
    ctx: &SpeakerContext,
    results: &[SearchResult],
    hints: Option<&str>,
) -> (Vec<ScoredCandidate>, Vec<CandidateReport>) {
    let mut scored = Vec::new();
    let mut reports = Vec::new();

    for result in results.iter().take(MAX_VALIDATED) {
        match score_candidate(llm, ctx, result, hints).await {
            Ok(candidate) => {
                debug!("{} scored {}", candidate.result.url, candidate.confidence);
                reports.push(CandidateReport::from(&candidate));
                scored.push(candidate);
            }
            Err(e) => {
                warn!("Validation failed for {}: {e}", result.url);
                reports.push(CandidateReport {
                    url: result.url.clone(),
                    title: result.title.clone(),
                    confidence: None,
                    reasoning: None,
                    red_flags: Vec::new(),
                    error: Some(e.to_string()),
                });
            }
        }
    }

    (scored, reports)
}

/// Drops results the user has rejected for this speaker.
pub fn drop_rejected(results: Vec<SearchResult>, rejected: &[String]) -> Vec<SearchResult> {
    let norm = |u: &str| u.trim().trim_end_matches('/').to_lowercase();
    results
        .into_iter()
        .filter(|r| !rejected.iter().any(|x| norm(x) == norm(&r.url)))
        .collect()
}

/// Highest-scoring candidate at or above [`MIN_CONFIDENCE`]. Company pages never qualify.
/// Ties keep the earlier (higher-ranked) result.
pub fn select_best(scored: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    scored
        .iter()
        .filter(|c| c.confidence >= MIN_CONFIDENCE && !is_company_page(&c.result.url))
        .fold(None, |best: Option<&ScoredCandidate>, c| match best {
            Some(b) if b.confidence >= c.confidence => Some(b),
            _ => Some(c),
        })
}

/// Keeps a LinkedIn URL only when it points at a personal profile.
pub fn sanitize_linkedin(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string())
        .filter(|u| is_personal_linkedin(u))
}

/// Profile fields taken straight from a search result, used when extraction fails.
pub fn fields_from_snippet(result: &SearchResult) -> EnrichedData {
    EnrichedData {
        title: String::new(),
        company: String::new(),
        summary: result.snippet.clone(),
        linkedin_url: sanitize_linkedin(Some(result.url.clone())),
    }
}

/// Extracts title/company/summary/LinkedIn from the winning result.
pub async fn extract_profile(
    llm: &LlmClient,
    ctx: &SpeakerContext,
    result: &SearchResult,
) -> Result<EnrichedData, LlmError> {
    let prompt = format!(
        "{}\n\n{}",
        PROFILE_EXTRACT_PROMPT
            .replace("{name}", &ctx.name)
            .replace("{title}", &result.title)
            .replace("{url}", &result.url)
            .replace("{snippet}", &result.snippet)
            .replace("{companies}", &or_unknown(&ctx.companies))
            .replace("{topics}", &or_unknown(&ctx.topics)),
        NO_FABRICATION_INSTRUCTION
    );
    let mut data: EnrichedData = llm.call_json(&prompt, JSON_ONLY_SYSTEM, EXTRACT_OPTIONS).await?;

    data.linkedin_url = sanitize_linkedin(data.linkedin_url)
        .or_else(|| sanitize_linkedin(Some(result.url.clone())));
    Ok(data)
}

/// Summary built from meeting context alone, used when no candidate qualifies.
pub fn context_only_summary(ctx: &SpeakerContext) -> EnrichedData {
    let mut parts = vec![format!(
        "{} appears in {} recorded meeting{}.",
        ctx.name,
        ctx.meeting_count,
        if ctx.meeting_count == 1 { "" } else { "s" }
    )];
    if !ctx.topics.is_empty() {
        parts.push(format!("Frequent topics: {}.", ctx.topics.join(", ")));
    }
    if !ctx.companies.is_empty() {
        parts.push(format!("Associated organizations: {}.", ctx.companies.join(", ")));
    }

    EnrichedData {
        title: ctx.role_hints.first().cloned().unwrap_or_default(),
        company: ctx.companies.first().cloned().unwrap_or_default(),
        summary: parts.join(" "),
        linkedin_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::parse_json_object;

    fn result(url: &str) -> SearchResult {
        SearchResult {
            title: "t".into(),
            url: url.into(),
            snippet: "s".into(),
        }
    }

    fn scored(url: &str, confidence: i32) -> ScoredCandidate {
        ScoredCandidate {
            result: result(url),
            confidence,
            reasoning: String::new(),
            red_flags: Vec::new(),
        }
    }

    #[test]
    fn test_select_best_respects_threshold() {
        let c = vec![scored("https://a", 29), scored("https://b", 12)];
        assert!(select_best(&c).is_none());

        let c = vec![scored("https://a", 30)];
        assert_eq!(select_best(&c).unwrap().result.url, "https://a");
    }

    #[test]
    fn test_select_best_picks_highest_and_first_on_tie() {
        let c = vec![
            scored("https://a", 55),
            scored("https://b", 80),
            scored("https://c", 80),
        ];
        assert_eq!(select_best(&c).unwrap().result.url, "https://b");
    }

    #[test]
    fn test_company_pages_never_selected() {
        let c = vec![
            scored("https://www.linkedin.com/company/acme", 95),
            scored("https://www.linkedin.com/in/jane", 40),
        ];
        assert_eq!(
            select_best(&c).unwrap().result.url,
            "https://www.linkedin.com/in/jane"
        );
    }

    #[test]
    fn test_sanitize_linkedin() {
        assert_eq!(sanitize_linkedin(Some("https://www.linkedin.com/company/x".into())), None);
        assert_eq!(sanitize_linkedin(Some("https://example.com/jane".into())), None);
        assert!(sanitize_linkedin(Some(" https://linkedin.com/in/jane ".into())).is_some());
    }

    #[test]
    fn test_drop_rejected_normalizes() {
        let results = vec![result("https://linkedin.com/in/jane/"), result("https://other")];
        let kept = drop_rejected(results, &["HTTPS://LINKEDIN.COM/IN/JANE".into()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://other");
    }

    #[test]
    fn test_context_only_summary_has_no_linkedin() {
        let ctx = SpeakerContext {
            name: "Jane".into(),
            companies: vec!["Acme".into()],
            topics: vec!["pricing".into()],
            role_hints: vec!["VP Sales".into()],
            meeting_count: 1,
            ..Default::default()
        };
        let data = context_only_summary(&ctx);
        assert_eq!(data.linkedin_url, None);
        assert_eq!(data.company, "Acme");
        assert!(data.summary.starts_with("Jane appears in 1 recorded meeting."));
    }

    #[test]
    fn test_validation_output_requires_confidence() {
        assert!(parse_json_object::<RawValidation>(r#"{"reasoning":"x"}"#).is_err());
        let v: RawValidation = parse_json_object(r#"{"confidence": 72.5}"#).unwrap();
        assert!(v.red_flags.is_empty());
    }

    #[test]
    fn test_prompt_includes_hints_only_when_present() {
        let ctx = SpeakerContext {
            name: "Jane".into(),
            ..Default::default()
        };
        let p = validation_prompt(&ctx, &result("https://x"), Some("works in Berlin"));
        assert!(p.contains("Notes from the user: works in Berlin"));
        let p = validation_prompt(&ctx, &result("https://x"), None);
        assert!(!p.contains("Notes from the user"));
        assert!(p.contains("Companies mentioned: Unknown"));
    }
}
