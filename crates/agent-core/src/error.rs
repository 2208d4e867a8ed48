//! Error Types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model output failed schema validation after its corrective retry
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool is registered but outside the active agent's allowed set
    #[error("Tool '{tool}' is not allowed for agent '{agent}'")]
    ToolNotAllowed { tool: String, agent: String },

    /// A tool with this name is already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// An agent with this name is already registered
    #[error("Duplicate agent: {0}")]
    DuplicateAgent(String),

    /// Executor fault. Never escapes the dispatcher; folded into a failed observation.
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Reasoning loop ran out of thinking cycles
    #[error("Iteration budget ({0}) exceeded")]
    IterationBudgetExceeded(usize),

    /// Handoff named an agent that is not registered
    #[error("Handoff target not found: {0}")]
    HandoffTargetNotFound(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Model call exceeded its timeout
    #[error("Model call timed out after {0:?}")]
    ModelTimeout(Duration),

    /// Model call kept failing after the retry policy ran out
    #[error("Upstream API failed after {attempts} attempt(s): {last}")]
    UpstreamExhausted { attempts: u32, last: Box<AgentError> },

    /// Session aborted from outside
    #[error("Session cancelled")]
    Cancelled,

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

/// Failure classification recorded on a failed session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decoding,
    UnknownTool,
    IterationBudgetExceeded,
    HandoffTargetNotFound,
    UpstreamApi,
    Cancelled,
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decoding => "DecodingError",
            Self::UnknownTool => "UnknownToolError",
            Self::IterationBudgetExceeded => "IterationBudgetExceeded",
            Self::HandoffTargetNotFound => "HandoffTargetNotFound",
            Self::UpstreamApi => "UpstreamAPIError",
            Self::Cancelled => "Cancelled",
            Self::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl AgentError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::ModelTimeout(_)
                | AgentError::Io(_)
        )
    }

    /// Whether this error came from the model provider call
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_)
                | AgentError::ProviderUnavailable(_)
                | AgentError::RateLimited(_)
                | AgentError::Auth(_)
                | AgentError::ModelTimeout(_)
                | AgentError::UpstreamExhausted { .. }
        )
    }

    /// Classify for the session failure record
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AgentError::Decoding(_) => FailureKind::Decoding,
            AgentError::UnknownTool(_) | AgentError::ToolNotAllowed { .. } => {
                FailureKind::UnknownTool
            }
            AgentError::IterationBudgetExceeded(_) => FailureKind::IterationBudgetExceeded,
            AgentError::HandoffTargetNotFound(_) => FailureKind::HandoffTargetNotFound,
            AgentError::Cancelled => FailureKind::Cancelled,
            e if e.is_upstream() => FailureKind::UpstreamApi,
            _ => FailureKind::Internal,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Decoding(_) => "The AI returned a response in an unexpected format.".into(),
            AgentError::UnknownTool(name) => format!("The tool '{}' is not available.", name),
            AgentError::ToolNotAllowed { tool, .. } => {
                format!("The tool '{}' is not available to this agent.", tool)
            }
            AgentError::IterationBudgetExceeded(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            AgentError::HandoffTargetNotFound(name) => {
                format!("The agent tried to delegate to '{}', which does not exist.", name)
            }
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ProviderUnavailable(_) | AgentError::ModelTimeout(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::UpstreamExhausted { last, .. } => last.user_message(),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            AgentError::Cancelled => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AgentError::RateLimited("slow down".into()).is_retryable());
        assert!(AgentError::ModelTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!AgentError::Auth("bad key".into()).is_retryable());
        assert!(!AgentError::Decoding("x".into()).is_retryable());
    }

    #[test]
    fn test_failure_kinds() {
        let exhausted = AgentError::UpstreamExhausted {
            attempts: 4,
            last: Box::new(AgentError::RateLimited("429".into())),
        };
        assert_eq!(exhausted.failure_kind(), FailureKind::UpstreamApi);
        assert_eq!(
            AgentError::ToolNotAllowed { tool: "shell".into(), agent: "Router".into() }.failure_kind(),
            FailureKind::UnknownTool
        );
        assert_eq!(AgentError::Config("x".into()).failure_kind(), FailureKind::Internal);
        assert_eq!(FailureKind::UpstreamApi.to_string(), "UpstreamAPIError");
    }
}
