use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Profile fields derived by enrichment. Persisted as JSON on the profile row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

impl EnrichedData {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.company.trim().is_empty()
            && self.summary.trim().is_empty()
            && self.linkedin_url.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerProfileRow {
    pub name_key: String,
    pub user_id: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub ai_summary: Option<String>,
    pub topics: Vec<String>,
    pub enriched_data: Option<Json<EnrichedData>>,
    pub enriched_confidence: Option<i32>,
    pub enriched_reasoning: Option<String>,
    pub enriched_sources: Vec<String>,
    pub web_enriched_at: Option<String>,
    pub enriched_at: Option<String>,
    pub human_verified: bool,
    pub human_verified_at: Option<String>,
    pub verified_full_name: Option<String>,
    pub human_hints: Option<String>,
    pub rejected_profiles: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl SpeakerProfileRow {
    pub fn enriched(&self) -> Option<&EnrichedData> {
        self.enriched_data.as_ref().map(|j| &j.0)
    }

    /// Preferred display name: the human-verified full name when present.
    pub fn canonical_name(&self) -> &str {
        self.verified_full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.display_name)
    }
}

/// Profiles are keyed by the lowercased, trimmed speaker name.
pub fn profile_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
impl SpeakerProfileRow {
    pub fn fixture(name: &str) -> Self {
        Self {
            name_key: profile_key(name),
            user_id: None,
            display_name: name.to_string(),
            bio: None,
            linkedin: None,
            company: None,
            role: None,
            ai_summary: None,
            topics: Vec::new(),
            enriched_data: None,
            enriched_confidence: None,
            enriched_reasoning: None,
            enriched_sources: Vec::new(),
            web_enriched_at: None,
            enriched_at: None,
            human_verified: false,
            human_verified_at: None,
            verified_full_name: None,
            human_hints: None,
            rejected_profiles: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enriched_data_empty() {
        assert!(EnrichedData::default().is_empty());
        let data = EnrichedData {
            company: "Acme".into(),
            ..Default::default()
        };
        assert!(!data.is_empty());
    }

    #[test]
    fn test_enriched_data_camel_case() {
        let json = r#"{"title":"CTO","company":"Acme","summary":"","linkedinUrl":"https://www.linkedin.com/in/jane"}"#;
        let data: EnrichedData = serde_json::from_str(json).unwrap();
        assert_eq!(data.linkedin_url.as_deref(), Some("https://www.linkedin.com/in/jane"));
    }

    #[test]
    fn test_canonical_name_prefers_verified() {
        let mut p = SpeakerProfileRow::fixture("jane");
        assert_eq!(p.canonical_name(), "jane");
        p.verified_full_name = Some("Jane Doe".into());
        assert_eq!(p.canonical_name(), "Jane Doe");
    }
}
