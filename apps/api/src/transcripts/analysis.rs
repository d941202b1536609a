use serde::{Deserialize, Serialize};

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, PLAIN_TEXT_SYSTEM};
use crate::llm_client::{CallOptions, LlmClient, LlmError};
use crate::transcripts::prompts::{PRIVACY_PROMPT, TOPIC_PROMPT};

const TOPIC_MIN_TEXT_CHARS: usize = 50;
const TOPIC_SAMPLE_CHARS: usize = 4000;
const TOPIC_MAX_CHARS: usize = 150;
const TOPIC_MAX_WORDS: usize = 25;
/// A truncated topic is cut back to the last space only when that space lies past this offset.
const TOPIC_MIN_CUT: usize = 50;

const PRIVACY_MIN_TEXT_CHARS: usize = 100;
const PRIVACY_SAMPLE_CHARS: usize = 6000;
const PRIVACY_MAX_REASON_CHARS: usize = 500;
const PRIVACY_MAX_TOPICS: usize = 10;

const TOPIC_OPTIONS: CallOptions = CallOptions::new(100, 0.3);
const PRIVACY_OPTIONS: CallOptions = CallOptions::new(300, 0.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Work,
    WorkWithPrivate,
    LikelyPrivate,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Work => "work",
            PrivacyLevel::WorkWithPrivate => "work_with_private",
            PrivacyLevel::LikelyPrivate => "likely_private",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPrivacy {
    level: PrivacyLevel,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default = "default_score")]
    confidence: f64,
    #[serde(default = "default_score")]
    work_percent: f64,
}

fn default_score() -> f64 {
    50.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrivacyAnalysis {
    pub level: PrivacyLevel,
    pub reason: String,
    pub topics: Vec<String>,
    pub confidence: i32,
    pub work_percent: i32,
}

impl From<RawPrivacy> for PrivacyAnalysis {
    fn from(raw: RawPrivacy) -> Self {
        Self {
            level: raw.level,
            reason: raw.reason.chars().take(PRIVACY_MAX_REASON_CHARS).collect(),
            topics: raw.topics.into_iter().take(PRIVACY_MAX_TOPICS).collect(),
            confidence: clamp_score(raw.confidence),
            work_percent: clamp_score(raw.work_percent),
        }
    }
}

fn clamp_score(v: f64) -> i32 {
    v.clamp(0.0, 100.0) as i32
}

fn sample(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Generates a 10-20 word topic line. `Ok(None)` when the text is too short to say anything.
pub async fn generate_topic(
    llm: &LlmClient,
    text: &str,
    title: &str,
) -> Result<Option<String>, LlmError> {
    if text.trim().chars().count() < TOPIC_MIN_TEXT_CHARS {
        return Ok(None);
    }
    let prompt = TOPIC_PROMPT
        .replace("{title}", title)
        .replace("{transcript}", &sample(text, TOPIC_SAMPLE_CHARS));
    let raw = llm.call_text(&prompt, PLAIN_TEXT_SYSTEM, TOPIC_OPTIONS).await?;
    Ok(normalize_topic(&raw))
}

/// Strips quotes and enforces the length cap, cutting at a word boundary when possible.
pub fn normalize_topic(raw: &str) -> Option<String> {
    let topic = raw.trim().trim_matches('"').trim();
    if topic.is_empty() {
        return None;
    }
    let chars = topic.chars().count();
    if chars <= TOPIC_MAX_CHARS && topic.split_whitespace().count() <= TOPIC_MAX_WORDS {
        return Some(topic.to_string());
    }

    let truncated: String = topic.chars().take(TOPIC_MAX_CHARS).collect();
    if chars > TOPIC_MAX_CHARS {
        if let Some(cut) = truncated.rfind(' ').filter(|&i| i > TOPIC_MIN_CUT) {
            return Some(truncated[..cut].to_string());
        }
    }
    Some(truncated)
}

/// Classifies how private a meeting is. `Ok(None)` when the text is too short to judge.
pub async fn analyze_privacy(
    llm: &LlmClient,
    text: &str,
    title: &str,
) -> Result<Option<PrivacyAnalysis>, LlmError> {
    if text.trim().chars().count() < PRIVACY_MIN_TEXT_CHARS {
        return Ok(None);
    }
    let prompt = PRIVACY_PROMPT
        .replace("{title}", title)
        .replace("{transcript}", &sample(text, PRIVACY_SAMPLE_CHARS));
    let raw: RawPrivacy = llm.call_json(&prompt, JSON_ONLY_SYSTEM, PRIVACY_OPTIONS).await?;
    Ok(Some(raw.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::parse_json_object;

    #[test]
    fn test_short_topic_passes_through() {
        assert_eq!(
            normalize_topic("\"Weekly sync - hiring plan\"\n").as_deref(),
            Some("Weekly sync - hiring plan")
        );
    }

    #[test]
    fn test_long_topic_cut_at_word_boundary() {
        let long = "word ".repeat(40);
        let t = normalize_topic(&long).unwrap();
        assert!(t.len() <= 150);
        assert!(!t.ends_with(' '));
        assert!(t.ends_with("word"));
    }

    #[test]
    fn test_long_unbroken_topic_hard_truncated() {
        let t = normalize_topic(&"x".repeat(200)).unwrap();
        assert_eq!(t.len(), 150);
    }

    #[test]
    fn test_empty_topic_is_none() {
        assert_eq!(normalize_topic("  \"\" "), None);
    }

    #[test]
    fn test_privacy_clamps_and_caps() {
        let raw: RawPrivacy = parse_json_object(&format!(
            r#"{{"level":"work_with_private","reason":"{}","topics":{},"confidence":140,"work_percent":-3}}"#,
            "r".repeat(900),
            serde_json::to_string(&vec!["t"; 15]).unwrap()
        ))
        .unwrap();
        let p = PrivacyAnalysis::from(raw);
        assert_eq!(p.level, PrivacyLevel::WorkWithPrivate);
        assert_eq!(p.reason.len(), 500);
        assert_eq!(p.topics.len(), 10);
        assert_eq!(p.confidence, 100);
        assert_eq!(p.work_percent, 0);
    }

    #[test]
    fn test_privacy_unknown_level_is_schema_error() {
        let err = parse_json_object::<RawPrivacy>(r#"{"level":"secret"}"#).unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[test]
    fn test_privacy_missing_scores_default_to_fifty() {
        let raw: RawPrivacy = parse_json_object(r#"{"level":"work"}"#).unwrap();
        let p = PrivacyAnalysis::from(raw);
        assert_eq!((p.confidence, p.work_percent), (50, 50));
    }
}
