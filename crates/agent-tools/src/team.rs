//! Agent Teams
//!
//! Ready-made agent specifications: a single ReAct assistant, and a research
//! team where a Router delegates to specialists through handoffs.
//!
//! ```text
//! Router ──► ResearchAgent ──► AnalysisAgent ──► WritingAgent
//!    └──────────────────────────────┴───────────────────┘
//! ```

use agent_core::{AgentSpec, OutputSchema, ParameterSchema};

pub const ASSISTANT: &str = "Assistant";
pub const ROUTER: &str = "Router";
pub const RESEARCH_AGENT: &str = "ResearchAgent";
pub const ANALYSIS_AGENT: &str = "AnalysisAgent";
pub const WRITING_AGENT: &str = "WritingAgent";

/// System prompt for the single-agent assistant
pub const ASSISTANT_PROMPT: &str = r#"You are a helpful assistant that reasons step by step.

For every request:
1. Think about what you need to know
2. Use a tool when you need a computation, the time, the weather, current information or a company profile
3. Look at the tool result before deciding the next step
4. Answer once you have what you need

Never do arithmetic in your head when the calculator can do it.
If a tool fails, read the error and try a different approach."#;

const ROUTER_PROMPT: &str = r#"You are a project coordinator managing a team of specialists.

Decide which specialist should handle the request and hand it off with a summary
that contains everything they need. Prefer:
- ResearchAgent for facts, current events and anything needing sources
- AnalysisAgent for numbers, comparisons and trade-offs
- WritingAgent for drafting polished text

Answer directly only for greetings or questions about the team itself."#;

const RESEARCH_PROMPT: &str = r#"You are a research specialist. Your job is to:
1. Search the web for current, reliable information
2. Use the specialised searches where they fit: company_research for companies,
   arxiv_search and paperswithcode_search for papers, twitter_search for
   recent discussion
3. Cross-check facts across results
4. Answer concisely and cite the urls you relied on

Only cite urls that appeared in your search results."#;

const ANALYSIS_PROMPT: &str = r#"You are a data analysis expert. Your job is to:
1. Analyze the findings you were given
2. Identify trends, patterns and insights, using the calculator for any numbers
3. Provide clear, actionable recommendations

Hand off to WritingAgent when the user asked for a written report."#;

const WRITING_PROMPT: &str = r#"You are a professional content writer. Your job is to:
1. Take the research and analysis in your brief
2. Write well-structured, engaging content
3. Keep it clear and readable

Always write in a clear, professional style."#;

/// Final answer schema for agents that must cite their sources
pub fn cited_answer() -> OutputSchema {
    OutputSchema::object(vec![
        ParameterSchema::required("answer", "string", "The answer to the research question"),
        ParameterSchema::required("citations", "array", "Urls of the sources the answer relies on"),
    ])
}

/// Single ReAct agent with every general-purpose tool
pub fn assistant() -> AgentSpec {
    AgentSpec::new(ASSISTANT, ASSISTANT_PROMPT)
        .description("General assistant with calculator, time, weather and web search")
        .tools([
            "calculator",
            "datetime",
            "weather",
            "web_search",
            "company_research",
            "arxiv_search",
            "save_note",
            "list_notes",
        ])
}

/// Router entry agent plus research, analysis and writing specialists
pub fn research_team() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(ROUTER, ROUTER_PROMPT)
            .description("Routes each request to the right specialist")
            .handoffs([RESEARCH_AGENT, ANALYSIS_AGENT, WRITING_AGENT]),
        AgentSpec::new(RESEARCH_AGENT, RESEARCH_PROMPT)
            .description("Finds current information on the web and cites sources")
            .tools([
                "web_search",
                "company_research",
                "arxiv_search",
                "paperswithcode_search",
                "twitter_search",
                "datetime",
            ])
            .output(cited_answer()),
        AgentSpec::new(ANALYSIS_AGENT, ANALYSIS_PROMPT)
            .description("Analyzes findings and numbers, gives recommendations")
            .tools(["calculator"])
            .handoffs([WRITING_AGENT]),
        AgentSpec::new(WRITING_AGENT, WRITING_PROMPT)
            .description("Turns research and analysis into polished text")
            .tools(["save_note", "list_notes"]),
    ]
}
