//! Error Types for Agent Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Invalid expression: {0}")]
    Expression(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Weather lookup failed: {0}")]
    Weather(String),

    #[error("Missing configuration: {0} is not set")]
    MissingConfig(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every toolkit failure is an executor fault from the orchestrator's point of view
impl From<ToolkitError> for AgentError {
    fn from(err: ToolkitError) -> Self {
        AgentError::ToolExecution(err.to_string())
    }
}
