//! Web search backends used by speaker enrichment.
//!
//! The default backend scrapes DuckDuckGo's HTML endpoint. Results are pulled
//! out with a strict pattern first and a looser one when the markup drifts.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
pub const MAX_RESULTS: usize = 5;

const PRIMARY_PATTERN: &str = r#"(?i)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>([^<]*)</a>[\s\S]*?<a[^>]*class="result__snippet"[^>]*>([^<]*(?:<[^>]*>[^<]*)*?)</a>"#;
const FALLBACK_PATTERN: &str = r#"(?i)<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]*)"[^>]*>([\s\S]*?)</a>"#;
const TAG_PATTERN: &str = r"<[^>]*>";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search engine returned status {0}")]
    Status(u16),

    #[error("invalid result pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Implement this to swap search backends without touching the enrichment pipeline.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    user_agent: String,
    primary: Regex,
    fallback: Regex,
    tags: Regex,
}

impl DuckDuckGoSearch {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            user_agent: user_agent.into(),
            primary: Regex::new(PRIMARY_PATTERN)?,
            fallback: Regex::new(FALLBACK_PATTERN)?,
            tags: Regex::new(TAG_PATTERN)?,
        })
    }

    /// Extracts up to [`MAX_RESULTS`] results from a results page.
    pub fn parse_results(&self, html: &str) -> Vec<SearchResult> {
        let mut results = Vec::new();

        for caps in self.primary.captures_iter(html) {
            let title = self.clean(&caps[2]);
            let url = decode_redirect(&caps[1]);
            if title.is_empty() || url.is_empty() {
                continue;
            }
            results.push(SearchResult {
                title,
                url,
                snippet: self.clean(&caps[3]),
            });
            if results.len() >= MAX_RESULTS {
                return results;
            }
        }

        if results.is_empty() {
            debug!("Primary result pattern found nothing, trying fallback");
            for caps in self.fallback.captures_iter(html) {
                let title = self.clean(&caps[2]);
                let url = decode_redirect(&caps[1]);
                if title.is_empty() || url.is_empty() {
                    continue;
                }
                results.push(SearchResult {
                    title,
                    url,
                    snippet: String::new(),
                });
                if results.len() >= MAX_RESULTS {
                    break;
                }
            }
        }

        results
    }

    fn clean(&self, fragment: &str) -> String {
        decode_entities(self.tags.replace_all(fragment, "").trim())
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let response = self
            .client
            .get(DUCKDUCKGO_HTML_URL)
            .query(&[("q", query)])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Search for '{}' returned {}", query, status);
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let results = self.parse_results(&html);
        debug!("Search '{}' returned {} results", query, results.len());
        Ok(results)
    }
}

/// Unwraps `//duckduckgo.com/l/?uddg=<encoded>&rut=...` redirect links.
pub fn decode_redirect(href: &str) -> String {
    let href = href.replace("&amp;", "&");
    let Some((_, query)) = href.split_once('?') else {
        return href;
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned())
        .unwrap_or(href)
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// True for LinkedIn company pages, which never describe a person.
pub fn is_company_page(url: &str) -> bool {
    url.to_lowercase().contains("linkedin.com/company/")
}

/// True for personal LinkedIn profile URLs.
pub fn is_personal_linkedin(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("linkedin.com/in/") && !lower.contains("/company/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DuckDuckGoSearch {
        DuckDuckGoSearch::new("test-agent").unwrap()
    }

    const PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.linkedin.com%2Fin%2Fjanedoe&amp;rut=abc">Jane Doe - CTO - Acme | LinkedIn</a>
  <a class="result__snippet" href="x">Jane is <b>CTO</b> at Acme &amp; Co.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://acme.example/team">Team</a>
  <a class="result__snippet" href="y">Meet the team</a>
</div>"#;

    #[test]
    fn test_primary_pattern_extracts_and_decodes() {
        let results = engine().parse_results(PAGE);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.linkedin.com/in/janedoe");
        assert_eq!(results[0].title, "Jane Doe - CTO - Acme | LinkedIn");
        assert_eq!(results[0].snippet, "Jane is CTO at Acme & Co.");
        assert_eq!(results[1].url, "https://acme.example/team");
    }

    #[test]
    fn test_fallback_pattern_without_snippets() {
        let html = r#"<a class="result__a js-result" href="https://example.com/a"><b>Result</b> A</a>"#;
        let results = engine().parse_results(html);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Result A");
        assert_eq!(results[0].snippet, "");
    }

    #[test]
    fn test_results_capped_at_five() {
        let one = r#"<a class="result__a" href="https://e.com/x">T</a><a class="result__snippet">s</a>"#;
        let html = one.repeat(8);
        assert_eq!(engine().parse_results(&html).len(), MAX_RESULTS);
    }

    #[test]
    fn test_decode_redirect_passthrough() {
        assert_eq!(decode_redirect("https://plain.example/"), "https://plain.example/");
        assert_eq!(decode_redirect("https://e.com/?q=1"), "https://e.com/?q=1");
    }

    #[test]
    fn test_linkedin_url_kinds() {
        assert!(is_company_page("https://www.linkedin.com/company/acme"));
        assert!(!is_personal_linkedin("https://www.linkedin.com/company/acme"));
        assert!(is_personal_linkedin("https://uk.linkedin.com/in/jane"));
    }
}
