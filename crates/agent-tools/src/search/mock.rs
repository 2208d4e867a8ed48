//! Mock Search Client
//!
//! For testing and demo purposes. Returns canned results by keyword.

use async_trait::async_trait;

use super::{SearchClient, SearchResult, SearchScope};
use crate::error::{Result, ToolkitError};

/// (keyword, title, url, snippet)
const CANNED: &[(&str, &str, &str, &str)] = &[
    (
        "cricket",
        "ICC World Test Championship Final 2025",
        "https://www.icc-cricket.com/tournaments/world-test-championship",
        "South Africa beat Australia by five wickets at Lord's in June 2025 to win the ICC World Test Championship.",
    ),
    (
        "python",
        "Python (programming language)",
        "https://en.wikipedia.org/wiki/Python_(programming_language)",
        "Python is a high-level programming language created by Guido van Rossum and first released in 1991. It is known for its simplicity and readability.",
    ),
    (
        "tokyo",
        "Tokyo",
        "https://en.wikipedia.org/wiki/Tokyo",
        "Tokyo is the capital of Japan with a metropolitan population of about 14 million, known for technology, culture and cuisine.",
    ),
    (
        "climate change",
        "Climate change",
        "https://en.wikipedia.org/wiki/Climate_change",
        "Climate change refers to long-term shifts in global temperatures and weather patterns. Burning fossil fuels is the main driver.",
    ),
    (
        "artificial intelligence",
        "Artificial intelligence",
        "https://en.wikipedia.org/wiki/Artificial_intelligence",
        "AI is the simulation of human intelligence in machines, including machine learning, deep learning and natural language processing.",
    ),
    (
        "renewable energy",
        "Renewable energy",
        "https://en.wikipedia.org/wiki/Renewable_energy",
        "Renewable energy comes from sources that naturally replenish, such as solar, wind, hydro and geothermal power.",
    ),
    (
        "quantum computing",
        "Quantum computing",
        "https://en.wikipedia.org/wiki/Quantum_computing",
        "Quantum computing uses quantum mechanics to process information in ways classical computers cannot.",
    ),
];

/// Mock search client with static results
#[derive(Debug, Default)]
pub struct MockSearchClient {
    unavailable: bool,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client whose every search fails, for exercising failed observations
    pub fn unavailable() -> Self {
        Self { unavailable: true }
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        if self.unavailable {
            return Err(ToolkitError::Search("search backend unavailable".into()));
        }

        let needle = query.to_lowercase();
        let mut results: Vec<SearchResult> = CANNED
            .iter()
            .filter(|(keyword, ..)| needle.contains(keyword))
            .map(|(_, title, url, snippet)| SearchResult {
                title: (*title).to_string(),
                url: (*url).to_string(),
                snippet: (*snippet).to_string(),
                published: None,
            })
            .collect();

        if results.is_empty() {
            results.push(SearchResult {
                title: format!("About {}", query.trim()),
                url: "https://en.wikipedia.org/wiki/Special:Search".into(),
                snippet: format!(
                    "General information found about '{}'. This topic has various applications and implications.",
                    query.trim()
                ),
                published: None,
            });
        }

        results.truncate(num_results);
        Ok(results)
    }

    /// Domain-restricted scopes get one canned hit on the scope's first domain
    async fn search_scoped(
        &self,
        scope: SearchScope,
        topic: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(domain) = scope.domains().first() else {
            return self.search(&scope.query(topic), num_results).await;
        };
        if self.unavailable {
            return Err(ToolkitError::Search("search backend unavailable".into()));
        }

        let mut results = vec![SearchResult {
            title: format!("{} on {}", topic.trim(), domain),
            url: format!("https://{}/", domain),
            snippet: format!("Recent {} results about '{}'.", domain, topic.trim()),
            published: None,
        }];
        results.truncate(num_results);
        Ok(results)
    }

    fn name(&self) -> &str {
        "MockSearch"
    }
}
