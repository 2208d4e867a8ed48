//! Web Search Tool
//!
//! Searches the web through a `SearchClient` and returns citations.
//! `ScopedSearchTool` does the same within one `SearchScope`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSchema};

use crate::error::ToolkitError;
use crate::search::{SearchClient, SearchScope};

const MAX_RESULTS: u64 = 10;

/// Tool for searching the web
pub struct WebSearchTool {
    client: Arc<dyn SearchClient>,
}

impl WebSearchTool {
    pub fn new(client: Arc<dyn SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search".into(),
            description: "Search the web for current information. Returns results with title, url and snippet; cite the urls you rely on."
                .into(),
            parameters: vec![
                ParameterSchema::required("query", "string", "Search query"),
                ParameterSchema::optional("num_results", "integer", "Number of results (1-10)")
                    .with_default(json!(3)),
            ],
            category: Some("research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        let num_results = requested_results(args, 3);

        let results = self.client.search(query, num_results).await?;

        tracing::debug!(
            backend = self.client.name(),
            query,
            results = results.len(),
            "Web search completed"
        );

        Ok(json!({
            "query": query,
            "results": results,
        }))
    }
}

fn requested_results(args: &Arguments, default: usize) -> usize {
    args.get("num_results")
        .and_then(Value::as_f64)
        .map_or(default, |n| (n.max(1.0) as u64).min(MAX_RESULTS) as usize)
}

/// Search tool bound to a single scope, e.g. arXiv papers
pub struct ScopedSearchTool {
    scope: SearchScope,
    client: Arc<dyn SearchClient>,
}

impl ScopedSearchTool {
    pub fn new(scope: SearchScope, client: Arc<dyn SearchClient>) -> Self {
        Self { scope, client }
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }
}

#[async_trait]
impl Tool for ScopedSearchTool {
    fn schema(&self) -> ToolSchema {
        let (description, topic) = match self.scope {
            SearchScope::Company => (
                "Research a company: business model, products and revenue, with source urls.",
                "Company name",
            ),
            SearchScope::Arxiv => ("Find recent research papers on arXiv.", "Research topic"),
            SearchScope::PapersWithCode => (
                "Find papers with code implementations on Papers with Code.",
                "Research topic",
            ),
            SearchScope::Twitter => (
                "Find recent discussions on Twitter/X about a topic.",
                "Topic to look for",
            ),
        };

        ToolSchema {
            name: self.scope.tool_name().into(),
            description: format!("{} Cite the urls you rely on.", description),
            parameters: vec![
                ParameterSchema::required("topic", "string", topic),
                ParameterSchema::optional("num_results", "integer", "Number of results (1-10)")
                    .with_default(json!(self.scope.default_results())),
            ],
            category: Some("research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let topic = args
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if topic.is_empty() {
            return Err(ToolkitError::InvalidInput("topic must not be empty".into()).into());
        }
        let num_results = requested_results(args, self.scope.default_results());

        let results = self
            .client
            .search_scoped(self.scope, topic, num_results)
            .await?;

        tracing::debug!(
            backend = self.client.name(),
            scope = ?self.scope,
            topic,
            results = results.len(),
            "Scoped search completed"
        );

        Ok(json!({
            "topic": topic,
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MockSearchClient;

    #[tokio::test]
    async fn test_returns_citations() {
        let tool = WebSearchTool::new(Arc::new(MockSearchClient::new()));
        let args = tool
            .schema()
            .validate(&json!({"query": "test cricket champion"}))
            .unwrap();
        let value = tool.execute(&args).await.unwrap();

        assert_eq!(value["query"], "test cricket champion");
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0]["url"].as_str().unwrap().starts_with("https://"));
    }

    #[tokio::test]
    async fn test_scoped_tools_search_their_scope() {
        let client: Arc<dyn SearchClient> = Arc::new(MockSearchClient::new());
        for scope in SearchScope::ALL {
            let tool = ScopedSearchTool::new(scope, client.clone());
            assert_eq!(tool.schema().name, scope.tool_name());
        }

        let tool = ScopedSearchTool::new(SearchScope::PapersWithCode, client);
        let args = tool.schema().validate(&json!({"topic": "object detection"})).unwrap();
        let value = tool.execute(&args).await.unwrap();
        assert_eq!(value["topic"], "object detection");
        assert_eq!(value["results"][0]["url"], "https://paperswithcode.com/");

        let args = tool.schema().validate(&json!({"topic": " "})).unwrap();
        assert!(tool.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_fault() {
        let tool = WebSearchTool::new(Arc::new(MockSearchClient::unavailable()));
        let args = tool.schema().validate(&json!({"query": "python"})).unwrap();
        assert!(tool.execute(&args).await.is_err());
    }
}
