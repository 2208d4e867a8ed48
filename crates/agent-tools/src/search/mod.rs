//! Web Search Integration
//!
//! Abstractions and implementations for web search backends.

mod exa;
mod mock;

pub use exa::{ExaConfig, ExaSearchClient};
pub use mock::MockSearchClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One search hit, usable as a citation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// Where a specialised search looks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchScope {
    /// Company profiles: business model, funding, revenue
    Company,
    /// Papers on arxiv.org
    Arxiv,
    /// Papers with implementations on paperswithcode.com
    PapersWithCode,
    /// Posts on twitter.com and x.com
    Twitter,
}

impl SearchScope {
    pub const ALL: [Self; 4] = [Self::Company, Self::Arxiv, Self::PapersWithCode, Self::Twitter];

    /// Name of the tool that searches this scope
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Company => "company_research",
            Self::Arxiv => "arxiv_search",
            Self::PapersWithCode => "paperswithcode_search",
            Self::Twitter => "twitter_search",
        }
    }

    /// Exa result category, if the scope maps to one
    pub fn category(self) -> Option<&'static str> {
        match self {
            Self::Company => Some("company"),
            _ => None,
        }
    }

    /// Domains results are restricted to
    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Self::Company => &[],
            Self::Arxiv => &["arxiv.org"],
            Self::PapersWithCode => &["paperswithcode.com"],
            Self::Twitter => &["twitter.com", "x.com"],
        }
    }

    /// Query text sent for `topic`
    pub fn query(self, topic: &str) -> String {
        match self {
            Self::Company => format!("{} company business model revenue", topic),
            _ => topic.to_string(),
        }
    }

    /// Hits returned when the caller does not say
    pub fn default_results(self) -> usize {
        match self {
            Self::Company => 3,
            _ => 5,
        }
    }
}

/// Search client trait (Strategy pattern)
///
/// Retries and backoff for remote backends belong to the implementation.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Up to `num_results` hits for `query`
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>>;

    /// Search restricted to `scope`. Backends without native filtering
    /// search the scope's query text.
    async fn search_scoped(
        &self,
        scope: SearchScope,
        topic: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search(&scope.query(topic), num_results).await
    }

    /// Backend name
    fn name(&self) -> &str;
}
