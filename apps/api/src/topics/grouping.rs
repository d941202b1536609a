//! Groups generated meeting topics by their main subject.
//!
//! Topics look like `"Main subject - details"`; the part before the first
//! `" - "` is the group key, compared case-insensitively.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::transcript::TranscriptRow;

const SUBJECT_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicGroup {
    pub topic: String,
    pub count: usize,
    pub meeting_ids: Vec<String>,
    pub latest_date: String,
    /// Full topic strings in this group, newest first.
    pub variants: Vec<String>,
}

pub fn main_subject(topic: &str) -> &str {
    topic
        .split_once(SUBJECT_SEPARATOR)
        .map(|(head, _)| head)
        .unwrap_or(topic)
        .trim()
}

/// Groups ordered by count, then by most recent meeting.
pub fn group_topics(records: &[TranscriptRow]) -> Vec<TopicGroup> {
    let mut sorted: Vec<&TranscriptRow> = records.iter().filter(|r| r.topic.is_some()).collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut groups: HashMap<String, TopicGroup> = HashMap::new();
    for row in sorted {
        let Some(topic) = row.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        let subject = main_subject(topic);
        let group = groups
            .entry(subject.to_lowercase())
            .or_insert_with(|| TopicGroup {
                topic: subject.to_string(),
                count: 0,
                meeting_ids: Vec::new(),
                latest_date: row.date.clone(),
                variants: Vec::new(),
            });
        group.count += 1;
        group.meeting_ids.push(row.meeting_id.clone());
        if !group.variants.iter().any(|v| v == topic) {
            group.variants.push(topic.to_string());
        }
    }

    let mut out: Vec<TopicGroup> = groups.into_values().collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.latest_date.cmp(&a.latest_date))
            .then_with(|| a.topic.cmp(&b.topic))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_topic(id: &str, ts: &str, topic: &str) -> TranscriptRow {
        let mut r = TranscriptRow::fixture(id, Some("u"), &[]).at(ts);
        r.topic = Some(topic.to_string());
        r
    }

    #[test]
    fn test_main_subject() {
        assert_eq!(main_subject("Q4 Sales Review - ACME deal"), "Q4 Sales Review");
        assert_eq!(main_subject("Standup"), "Standup");
        assert_eq!(main_subject("Self-serve pricing"), "Self-serve pricing");
    }

    #[test]
    fn test_groups_by_subject() {
        let records = vec![
            with_topic("m1", "2025-01-01T10:00:00Z", "Weekly standup - blockers"),
            with_topic("m2", "2025-01-08T10:00:00Z", "weekly standup - sprint review"),
            with_topic("m3", "2025-01-05T10:00:00Z", "Hiring plan - backend roles"),
            TranscriptRow::fixture("m4", Some("u"), &[]),
        ];
        let groups = group_topics(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].topic, "weekly standup");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].meeting_ids, vec!["m2", "m1"]);
        assert_eq!(groups[0].latest_date, "2025-01-08");
        assert_eq!(groups[1].count, 1);
    }
}
