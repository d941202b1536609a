//! Company mention extraction and stable company ids.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{CallOptions, LlmClient, LlmError};
use crate::companies::prompts::COMPANY_PROMPT;

pub const MIN_TEXT_CHARS: usize = 100;
pub const SAMPLE_CHARS: usize = 6000;
pub const MIN_CONFIDENCE: i32 = 50;

const COMPANY_OPTIONS: CallOptions = CallOptions::new(1000, 0.2);

const COMPANY_TYPES: [&str; 7] = [
    "customer",
    "prospect",
    "partner",
    "vendor",
    "competitor",
    "internal",
    "unknown",
];

/// Legal and generic suffixes ignored when deriving a company id.
const COMPANY_SUFFIXES: [&str; 18] = [
    "inc",
    "llc",
    "ltd",
    "corp",
    "corporation",
    "company",
    "co",
    "group",
    "labs",
    "technologies",
    "software",
    "systems",
    "solutions",
    "services",
    "partners",
    "ventures",
    "capital",
    "holdings",
];

#[derive(Debug, Deserialize)]
struct RawCompany {
    name: String,
    #[serde(rename = "type", default)]
    company_type: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCompany {
    pub name: String,
    pub company_type: String,
    pub confidence: i32,
}

/// Asks the model for companies mentioned in the transcript. Short texts yield
/// an empty list without a call.
pub async fn extract_companies(
    llm: &LlmClient,
    text: &str,
    title: &str,
) -> Result<Vec<ExtractedCompany>, LlmError> {
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Ok(Vec::new());
    }
    let sample: String = text.chars().take(SAMPLE_CHARS).collect();
    let prompt = COMPANY_PROMPT
        .replace("{title}", title)
        .replace("{transcript}", &sample);

    let raw: Vec<RawCompany> = llm
        .call_json_array(&prompt, JSON_ONLY_SYSTEM, COMPANY_OPTIONS)
        .await?;
    let found = clean_companies(raw);
    debug!("Extracted {} companies from '{}'", found.len(), title);
    Ok(found)
}

/// Drops low-confidence and too-short names and merges entries that share an id.
fn clean_companies(raw: Vec<RawCompany>) -> Vec<ExtractedCompany> {
    let mut out: Vec<ExtractedCompany> = Vec::new();
    for c in raw {
        let name = c.name.trim().to_string();
        let confidence = c.confidence.unwrap_or(50.0).clamp(0.0, 100.0) as i32;
        if name.chars().count() < 2 || confidence < MIN_CONFIDENCE {
            continue;
        }
        if out.iter().any(|o| company_id(&o.name) == company_id(&name)) {
            continue;
        }
        out.push(ExtractedCompany {
            name,
            company_type: normalize_type(c.company_type.as_deref()),
            confidence,
        });
    }
    out
}

fn normalize_type(raw: Option<&str>) -> String {
    let t = raw.unwrap_or("unknown").trim().to_lowercase();
    if COMPANY_TYPES.contains(&t.as_str()) {
        t
    } else {
        "unknown".to_string()
    }
}

/// Lowercased name with one trailing legal suffix (and any comma or dot) removed.
pub fn normalize_company_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let trimmed = lower.trim_end_matches('.');
    for suffix in COMPANY_SUFFIXES {
        if let Some(stem) = trimmed.strip_suffix(suffix) {
            let boundary = stem.is_empty() || stem.ends_with(' ') || stem.ends_with(',');
            let stem = stem.trim_end_matches([' ', ',']);
            if boundary && !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    trimmed.trim().to_string()
}

/// Stable 12-hex-character id for a company name.
pub fn company_id(name: &str) -> String {
    let digest = Sha256::digest(normalize_company_name(name).as_bytes());
    hex::encode(digest)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::parse_json_array;

    #[test]
    fn test_suffixes_are_ignored() {
        assert_eq!(normalize_company_name("Acme, Inc."), "acme");
        assert_eq!(normalize_company_name("Acme Corp"), "acme");
        assert_eq!(normalize_company_name("Globex"), "globex");
        assert_eq!(company_id("Acme Inc"), company_id("acme"));
        assert_eq!(company_id("Acme").len(), 12);
    }

    #[test]
    fn test_suffix_needs_word_boundary() {
        assert_eq!(normalize_company_name("Disco"), "disco");
        assert_eq!(normalize_company_name("Co"), "co");
    }

    #[test]
    fn test_clean_filters_low_confidence_and_duplicates() {
        let raw: Vec<RawCompany> = parse_json_array(
            r#"[
                {"name": "Acme Inc", "type": "customer", "confidence": 90},
                {"name": "acme", "type": "vendor", "confidence": 80},
                {"name": "Maybe Co", "confidence": 30},
                {"name": "Globex", "type": "frenemy", "confidence": 70}
            ]"#,
        )
        .unwrap();
        let found = clean_companies(raw);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].company_type, "customer");
        assert_eq!(found[1].name, "Globex");
        assert_eq!(found[1].company_type, "unknown");
    }
}
