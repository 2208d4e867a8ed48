//! # agent-core
//!
//! Reasoning loop with structured tool dispatch and multi-agent handoff,
//! independent of any particular LLM backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────────┐  │
//! │  │  Reasoning  │  │    Tool     │  │  ModelClient             │  │
//! │  │    Loop     │──│  Dispatcher │  │  (timeout, retry)        │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────────┘  │
//! │         │                │                     │                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────────┐  │
//! │  │  Decoder    │  │  Registry   │  │  LlmProvider (Strategy)  │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every session keeps an append-only [`Transcript`]. Tool failures become
//! failed observations the model can react to; structural failures end the
//! session as FAILED with a [`FailureKind`].

pub mod agent;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod reasoning;
pub mod schema;
pub mod session;
pub mod tool;
pub mod transcript;
pub mod usage;

pub use agent::{AgentSpec, HandoffTarget};
pub use config::{RetryPolicy, RunConfig};
pub use decoder::{ModelAction, StructuredDecoder};
pub use dispatcher::ToolDispatcher;
pub use error::{AgentError, FailureKind, Result};
pub use message::{Message, Role};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use provider::{Completion, CompletionRequest, LlmProvider, ModelClient, ScriptedProvider};
pub use reasoning::{LoopOutcome, ReasoningLoop};
pub use schema::{Arguments, OutputSchema, ParameterSchema, ToolSchema};
pub use session::{AgentSession, MemorySessionStore, SessionId, SessionStatus, SessionStore};
pub use tool::{Observation, Tool, ToolCall, ToolRegistry};
pub use transcript::{HandoffRequest, Transcript, Turn, TurnKind, TurnPayload};
pub use usage::{ModelPricing, SessionUsage, estimate_tokens};

/// Re-exported so callers can cancel sessions without a direct dependency
pub use tokio_util::sync::CancellationToken;
