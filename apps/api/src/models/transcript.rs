use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A user-supplied rename for a diarization label, stored per transcript
/// under the lowercased raw label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerCorrection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
}

pub type CorrectionMap = BTreeMap<String, SpeakerCorrection>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRow {
    pub meeting_id: String,
    pub user_id: Option<String>,
    pub s3_key: String,
    pub title: String,
    pub topic: Option<String>,
    pub date: String,
    pub timestamp: String,
    pub duration: i64,
    pub speakers: Vec<String>,
    pub speaker_corrections: Json<CorrectionMap>,
    pub event_type: String,
    pub received_at: String,
    pub url: String,
    pub is_private: bool,
    pub privacy_level: Option<String>,
    pub privacy_reason: Option<String>,
    pub privacy_topics: Vec<String>,
    pub privacy_confidence: Option<i32>,
    pub privacy_work_percent: Option<i32>,
    pub companies: Vec<String>,
    pub team_id: Option<String>,
    pub visibility: String,
    pub shared_with: Vec<String>,
    pub relinquished_by: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

impl TranscriptRow {
    /// Looks up the correction recorded for a raw speaker label, if any.
    pub fn correction_for(&self, label: &str) -> Option<&SpeakerCorrection> {
        self.speaker_corrections.0.get(&label.trim().to_lowercase())
    }

    /// Display name for a raw label after applying this transcript's corrections.
    pub fn display_name_for<'a>(&'a self, label: &'a str) -> &'a str {
        self.correction_for(label)
            .map(|c| c.name.as_str())
            .unwrap_or(label)
    }

    /// Speaker names as they should be shown to users.
    pub fn display_speakers(&self) -> Vec<String> {
        self.speakers
            .iter()
            .map(|s| self.display_name_for(s).to_string())
            .collect()
    }

    /// Lowercased keys under which this transcript is indexed for speaker lookup:
    /// every raw label plus every corrected name.
    pub fn speaker_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .speakers
            .iter()
            .flat_map(|label| {
                let mut k = vec![label.trim().to_lowercase()];
                if let Some(c) = self.correction_for(label) {
                    k.push(c.name.trim().to_lowercase());
                }
                k
            })
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Owned by `user_id` or shared with them through a team.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id) || self.shared_with.iter().any(|u| u == user_id)
    }
}

/// Returns false for diarization placeholders such as "Speaker 1" or "Unknown".
pub fn is_real_speaker_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    if lower.starts_with("speaker ") {
        return false;
    }
    if matches!(lower.as_str(), "unknown" | "guest" | "participant") {
        return false;
    }
    lower.chars().count() >= 2
}

#[cfg(test)]
impl TranscriptRow {
    pub fn fixture(meeting_id: &str, user_id: Option<&str>, speakers: &[&str]) -> Self {
        Self {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.map(String::from),
            s3_key: format!("users/u/meetings/{meeting_id}.json"),
            title: format!("Meeting {meeting_id}"),
            topic: None,
            date: "2025-01-15".to_string(),
            timestamp: "2025-01-15T10:00:00Z".to_string(),
            duration: 1800,
            speakers: speakers.iter().map(|s| s.to_string()).collect(),
            speaker_corrections: Json(CorrectionMap::new()),
            event_type: "transcript_created".to_string(),
            received_at: String::new(),
            url: String::new(),
            is_private: false,
            privacy_level: None,
            privacy_reason: None,
            privacy_topics: Vec::new(),
            privacy_confidence: None,
            privacy_work_percent: None,
            companies: Vec::new(),
            team_id: None,
            visibility: "private".to_string(),
            shared_with: Vec::new(),
            relinquished_by: None,
            indexed_at: Utc::now(),
        }
    }

    pub fn with_correction(mut self, label: &str, name: &str, linkedin: Option<&str>) -> Self {
        self.speaker_corrections.0.insert(
            label.trim().to_lowercase(),
            SpeakerCorrection {
                name: name.to_string(),
                linkedin: linkedin.map(String::from),
            },
        );
        self
    }

    pub fn at(mut self, timestamp: &str) -> Self {
        self.timestamp = timestamp.to_string();
        self.date = timestamp.chars().take(10).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correction_lookup_is_case_insensitive() {
        let t = TranscriptRow::fixture("m1", None, &["Speaker 1"]).with_correction(
            "speaker 1",
            "Jane Doe",
            None,
        );
        assert_eq!(t.display_name_for("SPEAKER 1"), "Jane Doe");
        assert_eq!(t.display_speakers(), vec!["Jane Doe"]);
    }

    #[test]
    fn test_speaker_keys_include_raw_and_corrected() {
        let t = TranscriptRow::fixture("m1", None, &["Speaker 1", "Bob"]).with_correction(
            "Speaker 1",
            "Jane Doe",
            None,
        );
        assert_eq!(t.speaker_keys(), vec!["bob", "jane doe", "speaker 1"]);
    }

    #[test]
    fn test_visibility_includes_shared() {
        let mut t = TranscriptRow::fixture("m1", None, &[]);
        assert!(!t.is_visible_to("u1"));
        t.shared_with = vec!["u1".into()];
        assert!(t.is_visible_to("u1"));
    }

    #[test]
    fn test_generic_speaker_names() {
        assert!(!is_real_speaker_name("Speaker 3"));
        assert!(!is_real_speaker_name("unknown"));
        assert!(!is_real_speaker_name("J"));
        assert!(is_real_speaker_name("Jane Doe"));
    }
}
