//! Daily briefing generation.
//!
//! Collects a day's transcripts with content plus metadata for the preceding
//! look-back window, asks the model for a narrative summary and stores it.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::briefings::prompts::BRIEFING_PROMPT;
use crate::briefings::store;
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{CallOptions, LlmClient, LlmError};
use crate::models::briefing::{
    ActionItem, BriefingRow, BriefingSummary, CrossReference, HistoricalCorrelation, MeetingSummary,
};
use crate::models::transcript::TranscriptRow;
use crate::state::AppState;
use crate::transcripts::content::fetch_content;
use crate::transcripts::store as transcripts;

pub const CONTENT_CHARS: usize = 8000;
pub const PROMPT_CONTENT_CHARS: usize = 4000;
const MAX_THEMES: usize = 10;
const MAX_ACTION_ITEMS: usize = 20;
const MAX_CROSS_REFERENCES: usize = 10;
const MAX_CORRELATIONS: usize = 10;
const SPEAKERS_SHOWN: usize = 5;
const HISTORY_SPEAKERS_SHOWN: usize = 3;

const BRIEFING_OPTIONS: CallOptions = CallOptions::new(5000, 0.4);

/// One of the day's meetings with its (truncated) transcript text.
#[derive(Debug, Clone)]
pub struct MeetingContent {
    pub title: String,
    pub duration: i64,
    pub speakers: Vec<String>,
    pub topic: Option<String>,
    pub content: String,
}

impl MeetingContent {
    fn from_row(row: &TranscriptRow, content: String) -> Self {
        Self {
            title: row.title.clone(),
            duration: row.duration,
            speakers: row.display_speakers(),
            topic: row.topic.clone(),
            content: content.chars().take(CONTENT_CHARS).collect(),
        }
    }
}

/// Shape the model must return. Lists are optional; the narrative is not.
#[derive(Debug, Deserialize)]
struct RawBriefing {
    narrative: String,
    #[serde(default)]
    meeting_count: Option<usize>,
    #[serde(default)]
    key_themes: Vec<String>,
    #[serde(default)]
    action_items: Vec<ActionItem>,
    #[serde(default)]
    cross_references: Vec<CrossReference>,
    #[serde(default)]
    meeting_summaries: Vec<MeetingSummary>,
    #[serde(default)]
    historical_correlations: Vec<HistoricalCorrelation>,
}

impl RawBriefing {
    fn into_summary(self, meetings: usize) -> BriefingSummary {
        let mut s = BriefingSummary {
            narrative: self.narrative,
            meeting_count: self.meeting_count.unwrap_or(meetings),
            key_themes: self.key_themes,
            action_items: self.action_items,
            cross_references: self.cross_references,
            meeting_summaries: self.meeting_summaries,
            historical_correlations: self.historical_correlations,
            total_duration_minutes: 0,
        };
        s.key_themes.truncate(MAX_THEMES);
        s.action_items.truncate(MAX_ACTION_ITEMS);
        s.cross_references.truncate(MAX_CROSS_REFERENCES);
        s.historical_correlations.truncate(MAX_CORRELATIONS);
        s
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingRunReport {
    pub users_processed: usize,
    pub briefings_created: usize,
    pub errors: Vec<String>,
}

/// Yesterday in UTC, `YYYY-MM-DD`.
pub fn default_briefing_date() -> String {
    (Utc::now() - Duration::days(1)).format("%Y-%m-%d").to_string()
}

pub fn parse_briefing_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

fn join_limited(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join(", ")
}

pub fn meetings_block(meetings: &[MeetingContent]) -> String {
    meetings
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let content: String = m.content.chars().take(PROMPT_CONTENT_CHARS).collect();
            format!(
                "Meeting {}: {}\nDuration: {} minutes\nParticipants: {}\nTopic: {}\n\nTranscript excerpt:\n{}\n",
                i + 1,
                m.title,
                m.duration / 60,
                join_limited(&m.speakers, SPEAKERS_SHOWN),
                m.topic.as_deref().unwrap_or("Not specified"),
                if content.is_empty() { "No content available".to_string() } else { content },
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Metadata-only history grouped by date, newest date first.
pub fn history_block(history: &[TranscriptRow]) -> String {
    let mut by_date: BTreeMap<&str, Vec<&TranscriptRow>> = BTreeMap::new();
    for row in history {
        by_date.entry(row.date.as_str()).or_default().push(row);
    }

    let mut lines = Vec::new();
    for (date, rows) in by_date.iter().rev() {
        lines.push(format!("\n{date}:"));
        for m in rows {
            lines.push(format!(
                "  - {} ({}min) with {}",
                m.title,
                m.duration / 60,
                join_limited(&m.display_speakers(), HISTORY_SPEAKERS_SHOWN)
            ));
            if let Some(topic) = &m.topic {
                lines.push(format!("    Topic: {topic}"));
            }
        }
    }
    lines.join("\n")
}

/// Summary stored when the model call or its schema fails.
pub fn fallback_summary(meetings: &[MeetingContent], date: &str) -> BriefingSummary {
    BriefingSummary {
        narrative: format!(
            "Unable to generate narrative briefing. You had {} meeting(s) on {}.",
            meetings.len(),
            date
        ),
        meeting_count: meetings.len(),
        meeting_summaries: meetings
            .iter()
            .map(|m| MeetingSummary {
                title: m.title.clone(),
                summary: format!("Meeting with {}", join_limited(&m.speakers, HISTORY_SPEAKERS_SHOWN)),
            })
            .collect(),
        ..Default::default()
    }
}

async fn summarize(
    llm: &LlmClient,
    meetings: &[MeetingContent],
    history: &[TranscriptRow],
    date: &str,
    history_days: i64,
) -> Result<BriefingSummary, LlmError> {
    let history_text = if history.is_empty() {
        format!("No previous meetings in the last {history_days} days.")
    } else {
        history_block(history)
    };
    let prompt = BRIEFING_PROMPT
        .replace("{date}", date)
        .replace("{meetings}", &meetings_block(meetings))
        .replace("{history_days}", &history_days.to_string())
        .replace("{history}", &history_text)
        .replace("{meeting_count}", &meetings.len().to_string());

    let raw: RawBriefing = llm.call_json(&prompt, JSON_ONLY_SYSTEM, BRIEFING_OPTIONS).await?;
    Ok(raw.into_summary(meetings.len()))
}

/// Generates and stores the briefing for `user_id` on `date`.
/// `NotFound` when the user has no transcripts that day.
pub async fn generate_for_user(state: &AppState, user_id: &str, date: &str) -> Result<BriefingRow, AppError> {
    let day = parse_briefing_date(date)?;
    let date = day.format("%Y-%m-%d").to_string();

    let todays = transcripts::for_user_between(&state.db, user_id, &date, &date).await?;
    if todays.is_empty() {
        return Err(AppError::NotFound(format!("No transcripts found for {date}")));
    }
    info!("Briefing {} for {}: {} meeting(s)", date, user_id, todays.len());

    let mut meetings = Vec::with_capacity(todays.len());
    for row in &todays {
        let content = match fetch_content(&state.blobs, &row.s3_key).await {
            Ok(c) => c.text,
            Err(e) => {
                warn!("Briefing content missing for {}: {e}", row.meeting_id);
                String::new()
            }
        };
        meetings.push(MeetingContent::from_row(row, content));
    }

    let days = state.config.historical_context_days;
    let start = (day - Duration::days(days)).format("%Y-%m-%d").to_string();
    let history: Vec<TranscriptRow> = transcripts::for_user_between(&state.db, user_id, &start, &date)
        .await?
        .into_iter()
        .filter(|r| r.date != date)
        .collect();

    let mut summary = match summarize(&state.llm, &meetings, &history, &date, days).await {
        Ok(s) => s,
        Err(e) => {
            warn!("Briefing generation failed for {} on {}: {e}", user_id, date);
            fallback_summary(&meetings, &date)
        }
    };
    summary.total_duration_minutes = todays.iter().map(|r| r.duration).sum::<i64>() / 60;

    let row = store::insert(&state.db, user_id, &date, &summary).await?;
    info!("Stored briefing {} for {}", row.briefing_id, user_id);
    Ok(row)
}

/// Runs yesterday's briefing for every user with transcripts.
pub async fn run_for_all_users(state: &AppState) -> Result<BriefingRunReport, AppError> {
    let date = default_briefing_date();
    let users = transcripts::distinct_user_ids(&state.db).await?;
    let mut report = BriefingRunReport::default();

    for user_id in users {
        report.users_processed += 1;
        match generate_for_user(state, &user_id, &date).await {
            Ok(_) => report.briefings_created += 1,
            Err(AppError::NotFound(_)) => {}
            Err(e) => {
                warn!("Briefing failed for {}: {e}", user_id);
                report.errors.push(format!("Error processing user {user_id}: {e}"));
            }
        }
    }

    info!(
        "Briefing run for {}: {} users, {} created, {} errors",
        date,
        report.users_processed,
        report.briefings_created,
        report.errors.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::parse_json_object;

    fn meeting(title: &str, speakers: &[&str]) -> MeetingContent {
        MeetingContent {
            title: title.into(),
            duration: 1800,
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
            topic: None,
            content: "z".repeat(5000),
        }
    }

    #[test]
    fn test_fallback_summary() {
        let s = fallback_summary(&[meeting("Sync", &["Jane", "Bob", "Ann", "Zed"])], "2025-03-03");
        assert_eq!(
            s.narrative,
            "Unable to generate narrative briefing. You had 1 meeting(s) on 2025-03-03."
        );
        assert_eq!(s.meeting_summaries[0].summary, "Meeting with Jane, Bob, Ann");
        assert!(s.key_themes.is_empty());
    }

    #[test]
    fn test_lists_are_truncated() {
        let themes: Vec<String> = (0..15).map(|i| format!("\"t{i}\"")).collect();
        let json = format!(r#"{{"narrative":"Good morning!","key_themes":[{}]}}"#, themes.join(","));
        let raw: RawBriefing = parse_json_object(&json).unwrap();
        let s = raw.into_summary(2);
        assert_eq!(s.key_themes.len(), MAX_THEMES);
        assert_eq!(s.meeting_count, 2);
    }

    #[test]
    fn test_missing_narrative_is_schema_error() {
        assert!(parse_json_object::<RawBriefing>(r#"{"key_themes":[]}"#).is_err());
    }

    #[test]
    fn test_meetings_block_caps_excerpt() {
        let block = meetings_block(&[meeting("Sync", &["Jane"])]);
        assert!(block.starts_with("Meeting 1: Sync\nDuration: 30 minutes"));
        assert_eq!(block.matches('z').count(), PROMPT_CONTENT_CHARS);
    }

    #[test]
    fn test_history_newest_date_first() {
        let rows = vec![
            TranscriptRow::fixture("a", Some("u"), &["Jane"]).at("2025-03-01T09:00:00Z"),
            TranscriptRow::fixture("b", Some("u"), &["Bob"]).at("2025-03-02T09:00:00Z"),
        ];
        let text = history_block(&rows);
        let first = text.find("2025-03-02").unwrap();
        let second = text.find("2025-03-01").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_parse_briefing_date() {
        assert!(parse_briefing_date("2025-03-03").is_ok());
        assert!(parse_briefing_date("03/03/2025").is_err());
    }
}
