//! Context extractor: what a speaker's recent meetings say about them.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::errors::AppError;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{CallOptions, LlmClient};
use crate::speakers::prompts::CONTEXT_PROMPT;
use crate::speakers::resolver::ResolvedSpeaker;
use crate::transcripts::content::fetch_content;

pub const MAX_CONTEXT_MEETINGS: usize = 10;
pub const MAX_FETCHED_MEETINGS: usize = 5;
pub const EXCERPT_CHARS: usize = 3000;

const MAX_KEYWORDS: usize = 10;
const MAX_COMPANIES: usize = 5;
const MAX_TOPICS: usize = 5;
const MAX_ROLE_HINTS: usize = 3;

const CONTEXT_OPTIONS: CallOptions = CallOptions::new(1024, 0.3);

/// Shape the model must return.
#[derive(Debug, Deserialize)]
struct ExtractedContext {
    keywords: Vec<String>,
    companies: Vec<String>,
    topics: Vec<String>,
    role_hints: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerContext {
    pub name: String,
    pub keywords: Vec<String>,
    pub companies: Vec<String>,
    pub topics: Vec<String>,
    pub role_hints: Vec<String>,
    pub meeting_count: usize,
    pub recent_meetings: Vec<String>,
}

impl SpeakerContext {
    fn from_extracted(resolved: &ResolvedSpeaker, raw: ExtractedContext) -> Self {
        Self {
            name: resolved.canonical_name.clone(),
            keywords: clean_list(raw.keywords, MAX_KEYWORDS),
            companies: clean_list(raw.companies, MAX_COMPANIES),
            topics: clean_list(raw.topics, MAX_TOPICS),
            role_hints: clean_list(raw.role_hints, MAX_ROLE_HINTS),
            meeting_count: resolved.meetings.len(),
            recent_meetings: recent_titles(resolved),
        }
    }
}

fn clean_list(items: Vec<String>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            continue;
        }
        out.push(item.to_string());
        if out.len() == cap {
            break;
        }
    }
    out
}

fn recent_titles(resolved: &ResolvedSpeaker) -> Vec<String> {
    resolved
        .meetings
        .iter()
        .take(MAX_CONTEXT_MEETINGS)
        .map(|m| m.title.clone())
        .collect()
}

/// Meeting list section of the prompt.
fn meetings_block(resolved: &ResolvedSpeaker) -> String {
    resolved
        .meetings
        .iter()
        .take(MAX_CONTEXT_MEETINGS)
        .map(|m| match &m.topic {
            Some(topic) => format!("- {} | {} | {}", m.date, m.title, topic),
            None => format!("- {} | {}", m.date, m.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs the context extractor over a resolved speaker's most recent meetings.
pub async fn extract_context(
    llm: &LlmClient,
    blobs: &BlobStore,
    resolved: &ResolvedSpeaker,
) -> Result<SpeakerContext, AppError> {
    if resolved.is_empty() {
        return Err(AppError::NotFound(format!(
            "No meetings found for {}",
            resolved.canonical_name
        )));
    }

    let mut excerpts = Vec::new();
    for meeting in resolved.meetings.iter().take(MAX_FETCHED_MEETINGS) {
        match fetch_content(blobs, &meeting.s3_key).await {
            Ok(content) => excerpts.push(format!(
                "### {} ({})\n{}",
                meeting.title,
                meeting.date,
                content.excerpt(EXCERPT_CHARS)
            )),
            Err(e) => warn!("Skipping content for {}: {e}", meeting.meeting_id),
        }
    }

    let prompt = format!(
        "{}\n\n{}",
        CONTEXT_PROMPT
            .replace("{name}", &resolved.canonical_name)
            .replace("{meeting_count}", &resolved.meetings.len().to_string())
            .replace("{meetings}", &meetings_block(resolved))
            .replace("{excerpts}", &excerpts.join("\n\n")),
        NO_FABRICATION_INSTRUCTION
    );

    let raw: ExtractedContext = llm.call_json(&prompt, JSON_ONLY_SYSTEM, CONTEXT_OPTIONS).await?;
    let ctx = SpeakerContext::from_extracted(resolved, raw);
    info!(
        "Context for {}: {} companies, {} topics from {} excerpts",
        ctx.name,
        ctx.companies.len(),
        ctx.topics.len(),
        excerpts.len()
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{parse_json_object, LlmError};
    use crate::models::transcript::TranscriptRow;
    use crate::speakers::resolver::resolve_in;

    fn resolved(n: usize) -> ResolvedSpeaker {
        let recs: Vec<TranscriptRow> = (0..n)
            .map(|i| {
                TranscriptRow::fixture(&format!("m{i}"), Some("u"), &["Jane"])
                    .at(&format!("2025-01-{:02}T10:00:00Z", i + 1))
            })
            .collect();
        resolve_in(&recs, "Jane")
    }

    #[test]
    fn test_clean_list_dedupes_and_caps() {
        let items = vec!["Acme".into(), " acme ".into(), "".into(), "Globex".into(), "Initech".into()];
        assert_eq!(clean_list(items, 2), vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_meetings_block_capped_at_ten() {
        let r = resolved(14);
        assert_eq!(meetings_block(&r).lines().count(), MAX_CONTEXT_MEETINGS);
        assert!(meetings_block(&r).starts_with("- 2025-01-14"));
    }

    #[test]
    fn test_context_from_model_output() {
        let raw: ExtractedContext = parse_json_object(
            r#"{"keywords":["k8s"],"companies":["Acme","Acme"],"topics":["infra"],"role_hints":["CTO"]}"#,
        )
        .unwrap();
        let ctx = SpeakerContext::from_extracted(&resolved(2), raw);
        assert_eq!(ctx.companies, vec!["Acme"]);
        assert_eq!(ctx.meeting_count, 2);
        assert_eq!(ctx.name, "Jane");
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let err = parse_json_object::<ExtractedContext>(r#"{"keywords":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }
}
