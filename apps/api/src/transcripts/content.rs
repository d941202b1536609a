use anyhow::{Context, Result};

use crate::blob::BlobStore;
use crate::transcripts::ingest::{summary_text, transcript_text, Envelope};

/// Raw text behind an index row.
#[derive(Debug, Clone, Default)]
pub struct TranscriptContent {
    pub text: String,
    pub summary: Option<String>,
}

impl TranscriptContent {
    /// The summary when present, otherwise the first `max_chars` of the transcript.
    pub fn excerpt(&self, max_chars: usize) -> String {
        match &self.summary {
            Some(s) => s.clone(),
            None => self.text.chars().take(max_chars).collect(),
        }
    }
}

/// Fetches and unwraps the stored envelope for `key`.
pub async fn fetch_content(blobs: &BlobStore, key: &str) -> Result<TranscriptContent> {
    let value = blobs.get_json(key).await?;
    let envelope: Envelope =
        serde_json::from_value(value).with_context(|| format!("object {key} is not an envelope"))?;
    Ok(TranscriptContent {
        text: transcript_text(&envelope),
        summary: summary_text(&envelope),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_prefers_summary() {
        let c = TranscriptContent {
            text: "abcdef".into(),
            summary: Some("short".into()),
        };
        assert_eq!(c.excerpt(3), "short");
    }

    #[test]
    fn test_excerpt_truncates_text() {
        let c = TranscriptContent {
            text: "abcdef".into(),
            summary: None,
        };
        assert_eq!(c.excerpt(3), "abc");
    }
}
