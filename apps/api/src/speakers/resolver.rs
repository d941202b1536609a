//! Speaker identity resolution.
//!
//! A speaker is identified by a free-text name. A meeting matches when any of
//! its raw diarization labels, or the correction recorded for that label,
//! equals the name case-insensitively.

use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;

use crate::models::transcript::TranscriptRow;
use crate::transcripts::store;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedMeeting {
    pub meeting_id: String,
    pub title: String,
    pub topic: Option<String>,
    pub date: String,
    pub timestamp: String,
    pub duration: i64,
    pub s3_key: String,
    /// The raw label that matched.
    pub speaker_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSpeaker {
    pub canonical_name: String,
    pub linkedin: Option<String>,
    /// Newest first.
    pub meetings: Vec<MatchedMeeting>,
}

impl ResolvedSpeaker {
    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }
}

/// Matches `name` against a set of transcripts.
pub fn resolve_in(records: &[TranscriptRow], name: &str) -> ResolvedSpeaker {
    let target = name.trim().to_lowercase();
    let mut matches: Vec<(MatchedMeeting, Option<(String, Option<String>)>)> = Vec::new();

    for record in records {
        for label in &record.speakers {
            let correction = record.correction_for(label);
            let raw_hit = label.trim().to_lowercase() == target;
            let corrected_hit = correction.is_some_and(|c| c.name.trim().to_lowercase() == target);
            if !(raw_hit || corrected_hit) {
                continue;
            }

            matches.push((
                MatchedMeeting {
                    meeting_id: record.meeting_id.clone(),
                    title: record.title.clone(),
                    topic: record.topic.clone(),
                    date: record.date.clone(),
                    timestamp: record.timestamp.clone(),
                    duration: record.duration,
                    s3_key: record.s3_key.clone(),
                    speaker_label: label.clone(),
                },
                correction.map(|c| (c.name.clone(), c.linkedin.clone())),
            ));
            break;
        }
    }

    matches.sort_by(|a, b| b.0.timestamp.cmp(&a.0.timestamp));

    let canonical_name = matches
        .iter()
        .find_map(|(_, c)| c.as_ref().map(|(n, _)| n.clone()))
        .unwrap_or_else(|| name.trim().to_string());
    let linkedin = matches
        .iter()
        .find_map(|(_, c)| c.as_ref().and_then(|(_, l)| l.clone()));

    ResolvedSpeaker {
        canonical_name,
        linkedin,
        meetings: matches.into_iter().map(|(m, _)| m).collect(),
    }
}

/// Resolves a speaker over the transcripts indexed under that name.
/// `user_id = None` resolves across every user.
pub async fn resolve(pool: &PgPool, name: &str, user_id: Option<&str>) -> Result<ResolvedSpeaker> {
    let key = name.trim().to_lowercase();
    let candidates = store::for_speaker(pool, &key, user_id).await?;
    Ok(resolve_in(&candidates, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_label_match() {
        let recs = vec![TranscriptRow::fixture("m1", Some("u"), &["Jane Doe", "Bob"])];
        let r = resolve_in(&recs, "jane doe");
        assert_eq!(r.meetings.len(), 1);
        assert_eq!(r.canonical_name, "jane doe");
        assert_eq!(r.meetings[0].speaker_label, "Jane Doe");
    }

    #[test]
    fn test_correction_is_canonical_and_label_stays_alias() {
        let rec = TranscriptRow::fixture("m1", Some("u"), &["Speaker 2"]).with_correction(
            "speaker 2",
            "Jane Doe",
            Some("https://www.linkedin.com/in/janedoe"),
        );
        let recs = vec![rec];

        let by_name = resolve_in(&recs, "JANE DOE");
        assert_eq!(by_name.canonical_name, "Jane Doe");
        assert_eq!(by_name.linkedin.as_deref(), Some("https://www.linkedin.com/in/janedoe"));

        let by_label = resolve_in(&recs, "speaker 2");
        assert_eq!(by_label.meetings.len(), 1);
        assert_eq!(by_label.canonical_name, "Jane Doe");
    }

    #[test]
    fn test_sorted_newest_first_and_latest_correction_wins() {
        let old = TranscriptRow::fixture("old", Some("u"), &["Speaker 1"])
            .with_correction("Speaker 1", "J. Doe", None)
            .at("2025-01-01T09:00:00Z");
        let new = TranscriptRow::fixture("new", Some("u"), &["Speaker 3"])
            .with_correction("Speaker 3", "j. doe", Some("https://www.linkedin.com/in/jd"))
            .at("2025-02-01T09:00:00Z");
        let r = resolve_in(&[old, new], "j. doe");
        let ids: Vec<_> = r.meetings.iter().map(|m| m.meeting_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(r.canonical_name, "j. doe");
        assert!(r.linkedin.is_some());
    }

    #[test]
    fn test_padded_labels_match_like_the_speaker_index() {
        let rec = TranscriptRow::fixture("m1", Some("u"), &["  Jane Doe "]);
        assert_eq!(rec.speaker_keys(), vec!["jane doe"]);
        assert_eq!(resolve_in(&[rec], "Jane Doe").meetings.len(), 1);

        let corrected = TranscriptRow::fixture("m2", Some("u"), &[" Speaker 3"])
            .with_correction("Speaker 3", "Ann Lee", None);
        assert_eq!(resolve_in(&[corrected], "ann lee").meetings.len(), 1);
    }

    #[test]
    fn test_one_match_per_meeting() {
        let rec = TranscriptRow::fixture("m1", Some("u"), &["Jane", "jane"]);
        assert_eq!(resolve_in(&[rec], "Jane").meetings.len(), 1);
    }

    #[test]
    fn test_no_partial_matches() {
        let rec = TranscriptRow::fixture("m1", Some("u"), &["Jane Doe"]);
        assert!(resolve_in(&[rec], "Jane").is_empty());
    }
}
