//! # agent-tools
//!
//! Concrete tools and agent teams for the orchestrator in `agent-core`.
//!
//! ## Tools
//!
//! | name                    | does                                          |
//! |-------------------------|-----------------------------------------------|
//! | `calculator`            | evaluates arithmetic expressions              |
//! | `datetime`              | current UTC time                              |
//! | `weather`               | current weather (mock or OpenWeatherMap)      |
//! | `web_search`            | web search with citations (mock or Exa)       |
//! | `company_research`      | company profile search                        |
//! | `arxiv_search`          | papers on arXiv                               |
//! | `paperswithcode_search` | papers with code on Papers with Code          |
//! | `twitter_search`        | recent posts on Twitter/X                     |
//! | `save_note`             | keeps a short note in a bounded note book     |
//! | `list_notes`            | reads back recent notes                       |
//!
//! ## Example
//!
//! ```rust,ignore
//! let search: Arc<dyn SearchClient> = Arc::new(MockSearchClient::new());
//! let weather: Arc<dyn WeatherSource> = Arc::new(MockWeather::new());
//! let orchestrator = Orchestrator::builder()
//!     .provider(provider)
//!     .tools(default_registry(search, weather)?)
//!     .agents(research_team())
//!     .entry(team::ROUTER)
//!     .build()?;
//! ```

pub mod error;
pub mod search;
pub mod svckit;
pub mod team;
pub mod weather;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{Result, ToolkitError};
pub use search::{ExaSearchClient, MockSearchClient, SearchClient, SearchResult, SearchScope};
pub use team::{assistant, research_team};
pub use weather::{MockWeather, OpenWeatherClient, WeatherReport, WeatherSource};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CalculatorTool, DateTimeTool, ListNotesTool, NoteBook, SaveNoteTool, ScopedSearchTool,
        WeatherTool, WebSearchTool,
    };
}

/// Registry with every tool in this crate. Search tools go through `search`,
/// the weather tool through `weather`; the note tools share one note book.
pub fn default_registry(
    search: Arc<dyn SearchClient>,
    weather: Arc<dyn WeatherSource>,
) -> agent_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(tools::CalculatorTool::new())?;
    registry.register(tools::DateTimeTool::new())?;
    registry.register(tools::WeatherTool::new(weather))?;
    registry.register(tools::WebSearchTool::new(search.clone()))?;
    for scope in SearchScope::ALL {
        registry.register(tools::ScopedSearchTool::new(scope, search.clone()))?;
    }

    let notes = Arc::new(tools::NoteBook::new());
    registry.register(tools::SaveNoteTool::new(notes.clone()))?;
    registry.register(tools::ListNotesTool::new(notes))?;
    Ok(registry)
}
