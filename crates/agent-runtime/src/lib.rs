//! # agent-runtime
//!
//! Model providers for the agent orchestrator.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OllamaProvider;
//!
//! let provider = OllamaProvider::from_env();
//! let orchestrator = Orchestrator::builder()
//!     .provider(Arc::new(provider))
//!     .agents(team)
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, CompletionRequest, LlmProvider, Message, Result, Role};
