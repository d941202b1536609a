use serde::Serialize;

use crate::models::transcript::TranscriptRow;

/// One speaker turn in a raw transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub speaker: String,
    /// Label as it appears in the raw transcript, before corrections.
    pub original_speaker: String,
    pub timestamp: String,
    pub text: String,
}

/// Splits raw transcript text into speaker turns.
///
/// Turns start with a header line `Label | mm:ss` (or `hh:mm:ss`). Text before
/// the first header is attributed to an empty label.
pub fn parse_segments(raw: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<Segment> = None;

    for line in raw.lines() {
        if let Some((label, ts)) = parse_header(line) {
            if let Some(done) = current.take() {
                segments.push(finish(done));
            }
            current = Some(Segment {
                speaker: label.to_string(),
                original_speaker: label.to_string(),
                timestamp: ts.to_string(),
                text: String::new(),
            });
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let seg = current.get_or_insert_with(|| Segment {
            speaker: String::new(),
            original_speaker: String::new(),
            timestamp: String::new(),
            text: String::new(),
        });
        if !seg.text.is_empty() {
            seg.text.push(' ');
        }
        seg.text.push_str(trimmed);
    }

    if let Some(done) = current {
        segments.push(finish(done));
    }
    segments.retain(|s| !s.text.is_empty());
    segments
}

/// Applies the transcript's correction map to every segment label.
pub fn apply_corrections(segments: &mut [Segment], row: &TranscriptRow) {
    for seg in segments.iter_mut() {
        if let Some(c) = row.correction_for(&seg.original_speaker) {
            seg.speaker = c.name.clone();
        }
    }
}

fn finish(seg: Segment) -> Segment {
    Segment {
        text: seg.text.trim().to_string(),
        ..seg
    }
}

fn parse_header(line: &str) -> Option<(&str, &str)> {
    let (label, ts) = line.split_once('|')?;
    let label = label.trim();
    let ts = ts.trim();
    if label.is_empty() || !is_clock(ts) {
        return None;
    }
    Some((label, ts))
}

fn is_clock(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 2 && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "Speaker 1 | 00:00\nHello everyone.\nLet's start.\n\nJane Doe | 00:15\nThanks for joining.\n";

    #[test]
    fn test_parses_turns_and_joins_lines() {
        let segs = parse_segments(RAW);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].speaker, "Speaker 1");
        assert_eq!(segs[0].timestamp, "00:00");
        assert_eq!(segs[0].text, "Hello everyone. Let's start.");
        assert_eq!(segs[1].speaker, "Jane Doe");
    }

    #[test]
    fn test_pipe_in_body_is_not_a_header() {
        let segs = parse_segments("Bob | 01:02:03\nrevenue | margin split\n");
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].timestamp, "01:02:03");
        assert_eq!(segs[0].text, "revenue | margin split");
    }

    #[test]
    fn test_corrections_rename_but_keep_original() {
        let row = TranscriptRow::fixture("m1", Some("u1"), &["Speaker 1"]).with_correction(
            "speaker 1",
            "Alex Kim",
            None,
        );
        let mut segs = parse_segments(RAW);
        apply_corrections(&mut segs, &row);
        assert_eq!(segs[0].speaker, "Alex Kim");
        assert_eq!(segs[0].original_speaker, "Speaker 1");
        assert_eq!(segs[1].speaker, "Jane Doe");
    }

    #[test]
    fn test_unstructured_text_becomes_single_segment() {
        let segs = parse_segments("just some notes\nwithout headers");
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].speaker, "");
    }
}
