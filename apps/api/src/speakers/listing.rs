//! Per-user speaker directory, aggregated from the transcript index.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::speaker::{profile_key, SpeakerProfileRow};
use crate::models::transcript::{is_real_speaker_name, TranscriptRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerSummary {
    pub name: String,
    pub meeting_count: usize,
    pub last_seen: String,
    pub total_duration: i64,
    pub role: Option<String>,
    pub company: Option<String>,
    pub linkedin: Option<String>,
    pub human_verified: bool,
}

/// Counts each display name once per meeting. Names are grouped
/// case-insensitively; the first spelling seen wins.
pub fn aggregate(records: &[TranscriptRow], include_generic: bool) -> Vec<SpeakerSummary> {
    let mut by_key: HashMap<String, SpeakerSummary> = HashMap::new();

    for row in records {
        let mut seen_here: Vec<String> = Vec::new();
        for name in row.display_speakers() {
            let name = name.trim().to_string();
            if name.is_empty() || (!include_generic && !is_real_speaker_name(&name)) {
                continue;
            }
            let key = profile_key(&name);
            if seen_here.contains(&key) {
                continue;
            }
            seen_here.push(key.clone());

            let entry = by_key.entry(key).or_insert_with(|| SpeakerSummary {
                name: name.clone(),
                meeting_count: 0,
                last_seen: String::new(),
                total_duration: 0,
                role: None,
                company: None,
                linkedin: None,
                human_verified: false,
            });
            entry.meeting_count += 1;
            entry.total_duration += row.duration;
            if row.timestamp > entry.last_seen {
                entry.last_seen = row.timestamp.clone();
            }
        }
    }

    let mut out: Vec<SpeakerSummary> = by_key.into_values().collect();
    out.sort_by(|a, b| {
        b.meeting_count
            .cmp(&a.meeting_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

/// Copies role, company and LinkedIn from stored profiles onto the summaries.
pub fn attach_profiles(summaries: &mut [SpeakerSummary], profiles: &[SpeakerProfileRow]) {
    let by_key: HashMap<&str, &SpeakerProfileRow> =
        profiles.iter().map(|p| (p.name_key.as_str(), p)).collect();

    for s in summaries.iter_mut() {
        let Some(p) = by_key.get(profile_key(&s.name).as_str()) else {
            continue;
        };
        let enriched = p.enriched();
        s.role = p
            .role
            .clone()
            .or_else(|| enriched.map(|e| e.title.clone()).filter(|t| !t.is_empty()));
        s.company = p
            .company
            .clone()
            .or_else(|| enriched.map(|e| e.company.clone()).filter(|c| !c.is_empty()));
        s.linkedin = p
            .linkedin
            .clone()
            .or_else(|| enriched.and_then(|e| e.linkedin_url.clone()));
        s.human_verified = p.human_verified;
    }
}

/// Totals over a resolved speaker's meetings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerStats {
    pub meeting_count: usize,
    pub total_duration: i64,
    pub first_meeting: Option<String>,
    pub last_meeting: Option<String>,
}

impl SpeakerStats {
    /// `meetings` is newest first, as returned by the resolver.
    pub fn from_meetings(meetings: &[crate::speakers::resolver::MatchedMeeting]) -> Self {
        Self {
            meeting_count: meetings.len(),
            total_duration: meetings.iter().map(|m| m.duration).sum(),
            first_meeting: meetings.last().map(|m| m.date.clone()),
            last_meeting: meetings.first().map(|m| m.date.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::speaker::EnrichedData;
    use crate::speakers::resolver::resolve_in;
    use sqlx::types::Json;

    fn records() -> Vec<TranscriptRow> {
        vec![
            TranscriptRow::fixture("m1", Some("u"), &["Jane Doe", "Speaker 2"]).at("2025-01-01T10:00:00Z"),
            TranscriptRow::fixture("m2", Some("u"), &["jane doe", "Bob"]).at("2025-02-01T10:00:00Z"),
            TranscriptRow::fixture("m3", Some("u"), &["Speaker 1"])
                .with_correction("Speaker 1", "Bob", None)
                .at("2025-03-01T10:00:00Z"),
        ]
    }

    #[test]
    fn test_aggregate_counts_and_last_seen() {
        let list = aggregate(&records(), false);
        assert_eq!(list.len(), 2);
        let bob = list.iter().find(|s| s.name == "Bob").unwrap();
        assert_eq!(bob.meeting_count, 2);
        assert_eq!(bob.last_seen, "2025-03-01T10:00:00Z");
        let jane = list.iter().find(|s| s.name == "Jane Doe").unwrap();
        assert_eq!(jane.meeting_count, 2);
    }

    #[test]
    fn test_generic_names_opt_in() {
        assert!(!aggregate(&records(), false).iter().any(|s| s.name == "Speaker 2"));
        assert!(aggregate(&records(), true).iter().any(|s| s.name == "Speaker 2"));
    }

    #[test]
    fn test_attach_profile_prefers_manual_fields() {
        let mut list = aggregate(&records(), false);
        let mut p = SpeakerProfileRow::fixture("Bob");
        p.role = Some("CFO".into());
        p.enriched_data = Some(Json(EnrichedData {
            title: "Finance Lead".into(),
            company: "Acme".into(),
            ..Default::default()
        }));
        attach_profiles(&mut list, &[p]);
        let bob = list.iter().find(|s| s.name == "Bob").unwrap();
        assert_eq!(bob.role.as_deref(), Some("CFO"));
        assert_eq!(bob.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_single_meeting_stats() {
        let recs = vec![TranscriptRow::fixture("m1", Some("u"), &["Jane Doe"])];
        let resolved = resolve_in(&recs, "Jane Doe");
        let stats = SpeakerStats::from_meetings(&resolved.meetings);
        assert_eq!(stats.meeting_count, 1);
        assert_eq!(stats.first_meeting, stats.last_meeting);
    }
}
