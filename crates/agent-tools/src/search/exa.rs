//! Exa Search Client
//!
//! Real-time web search over the Exa HTTP API. The API key is read from the
//! environment here and never logged.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{SearchClient, SearchResult, SearchScope};
use crate::error::{Result, ToolkitError};

const SNIPPET_CHARS: usize = 500;

/// Exa client configuration
#[derive(Clone)]
pub struct ExaConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ExaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExaConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ExaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.exa.ai".into(),
            timeout: Duration::from_secs(20),
        }
    }

    /// Read `EXA_API_KEY` (required) and `EXA_BASE_URL` (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("EXA_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ToolkitError::MissingConfig("EXA_API_KEY"))?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = lookup("EXA_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest<'a> {
    query: &'a str,
    num_results: usize,
    contents: ExaContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'static str>,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'static [&'static str],
}

fn no_domains(domains: &&[&str]) -> bool {
    domains.is_empty()
}

impl<'a> ExaRequest<'a> {
    fn new(query: &'a str, num_results: usize) -> Self {
        Self {
            query,
            num_results,
            contents: ExaContents {
                text: ExaText {
                    max_characters: SNIPPET_CHARS * 2,
                },
            },
            category: None,
            include_domains: &[],
        }
    }

    fn scoped(query: &'a str, num_results: usize, scope: SearchScope) -> Self {
        Self {
            category: scope.category(),
            include_domains: scope.domains(),
            ..Self::new(query, num_results)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaContents {
    text: ExaText,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaText {
    max_characters: usize,
}

#[derive(Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaHit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

impl From<ExaHit> for SearchResult {
    fn from(hit: ExaHit) -> Self {
        let snippet: String = hit
            .text
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(SNIPPET_CHARS)
            .collect();

        Self {
            title: hit.title.unwrap_or_else(|| hit.url.clone()),
            url: hit.url,
            snippet,
            published: hit.published_date,
        }
    }
}

/// Exa web search client
pub struct ExaSearchClient {
    http: reqwest::Client,
    config: ExaConfig,
}

impl ExaSearchClient {
    pub fn new(config: ExaConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ExaConfig::from_env()?)
    }

    async fn post_search(&self, body: &ExaRequest<'_>) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .post(format!("{}/search", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Exa search request failed");
            return Err(ToolkitError::Search(format!("Exa returned HTTP {}", status)));
        }

        let parsed: ExaResponse = response.json().await?;
        tracing::debug!(results = parsed.results.len(), "Exa search completed");
        Ok(parsed.results.into_iter().map(SearchResult::from).collect())
    }
}

#[async_trait]
impl SearchClient for ExaSearchClient {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        self.post_search(&ExaRequest::new(query, num_results)).await
    }

    async fn search_scoped(
        &self,
        scope: SearchScope,
        topic: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = scope.query(topic);
        self.post_search(&ExaRequest::scoped(&query, num_results, scope))
            .await
    }

    fn name(&self) -> &str {
        "Exa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_key() {
        let err = ExaConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ToolkitError::MissingConfig("EXA_API_KEY")));

        let config = ExaConfig::from_lookup(|key| match key {
            "EXA_API_KEY" => Some("secret".into()),
            "EXA_BASE_URL" => Some("http://localhost:9999/".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9999");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_request_wire_format() {
        let body = ExaRequest::new("rust", 3);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["numResults"], 3);
        assert_eq!(json["contents"]["text"]["maxCharacters"], SNIPPET_CHARS * 2);
        assert!(json.get("category").is_none());
        assert!(json.get("includeDomains").is_none());
    }

    #[test]
    fn test_scoped_request_wire_format() {
        let query = SearchScope::Company.query("Anthropic");
        let json = serde_json::to_value(ExaRequest::scoped(&query, 3, SearchScope::Company)).unwrap();
        assert_eq!(json["query"], "Anthropic company business model revenue");
        assert_eq!(json["category"], "company");
        assert!(json.get("includeDomains").is_none());

        let json = serde_json::to_value(ExaRequest::scoped("agents", 5, SearchScope::Twitter)).unwrap();
        assert_eq!(json["includeDomains"], serde_json::json!(["twitter.com", "x.com"]));
        assert!(json.get("category").is_none());
    }

    #[test]
    fn test_hit_conversion() {
        let response: ExaResponse = serde_json::from_str(
            r#"{"results": [{"url": "https://example.com", "text": "line one\n\n  line two", "publishedDate": "2025-06-14"}]}"#,
        )
        .unwrap();
        let result = SearchResult::from(response.results.into_iter().next().unwrap());
        assert_eq!(result.title, "https://example.com");
        assert_eq!(result.snippet, "line one line two");
        assert_eq!(result.published.as_deref(), Some("2025-06-14"));
    }
}
