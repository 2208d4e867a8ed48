//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (Ollama, scripted stubs, etc.)
//! allowing the agent to work with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, ModelClient};
//!
//! // Wrap a provider with timeout and retry handling
//! let client = ModelClient::new(provider, config.model_timeout, config.model_retry.clone());
//!
//! let completion = client.complete(&request, &cancel).await?;
//! ```

mod scripted;

pub use scripted::ScriptedProvider;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::HandoffTarget;
use crate::config::RetryPolicy;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::schema::{OutputSchema, ToolSchema};
use crate::usage::SessionUsage;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "qwen2.5")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Everything the model needs for one thinking step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Agent name (for logging and provider-side attribution)
    pub agent: String,

    /// Full system prompt: instructions plus tool, handoff and output sections
    pub instructions: String,

    /// Transcript rendered as message history
    pub messages: Vec<Message>,

    /// Tools the active agent may call
    pub tools: Vec<ToolSchema>,

    /// Agents the active agent may hand off to
    pub handoff_targets: Vec<HandoffTarget>,

    /// Shape the final answer must take
    pub output_schema: OutputSchema,

    /// Generation options
    pub options: GenerationOptions,
}

/// Provider-native tool call, arguments still raw
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// JSON-encoded arguments exactly as returned by the provider
    pub arguments: String,
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Native tool calls, for providers that support them
    #[serde(default)]
    pub tool_calls: Vec<RawToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Plain text completion
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// Completion carrying one native tool call
    pub fn tool_call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![RawToolCall {
                id: None,
                name: name.into(),
                arguments: arguments.to_string(),
            }],
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }
    }

    /// Text as it should be replayed to the model
    pub fn replay(&self) -> String {
        if self.tool_calls.is_empty() {
            return self.content.clone();
        }
        let mut out = self.content.clone();
        for call in &self.tool_calls {
            if !out.is_empty() {
                out.push('\n');
            }
            // arguments stay raw so a malformed payload is replayed as sent
            let name = serde_json::Value::from(call.name.as_str());
            out.push_str(&format!(
                "```tool\n{{\"tool\": {}, \"arguments\": {}}}\n```",
                name, call.arguments
            ));
        }
        out
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub context_length: Option<u32>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface. Errors should use the
/// upstream variants of `AgentError` so the retry loop can classify them.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion for one thinking step
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

/// Provider wrapper applying the model timeout, cancellation and retry policy.
///
/// Also meters every successful call; clones share the same meter.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
    retry: RetryPolicy,
    usage: Arc<Mutex<SessionUsage>>,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            provider,
            timeout,
            retry,
            usage: Arc::default(),
        }
    }

    /// Usage of all successful calls so far
    pub fn usage(&self) -> SessionUsage {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn meter(&self, request: &CompletionRequest, completion: &Completion) {
        let (usage, estimated) = match &completion.usage {
            Some(usage) => (usage.clone(), false),
            None => (TokenUsage::estimate(request, completion), true),
        };
        tracing::debug!(
            agent = %request.agent,
            provider = self.provider.name(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            estimated,
            "Model call completed"
        );
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&usage, estimated);
    }

    /// Call the model, retrying retryable upstream failures with backoff
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let call = tokio::time::timeout(self.timeout, self.provider.complete(request));
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                r = call => r.unwrap_or_else(|_| Err(AgentError::ModelTimeout(self.timeout))),
            };

            let err = match outcome {
                Ok(completion) => {
                    self.meter(request, &completion);
                    return Ok(completion);
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::error!(agent = %request.agent, error = %err, "Model call failed");
                return Err(err);
            }
            if attempt > self.retry.max_retries {
                tracing::error!(agent = %request.agent, attempts = attempt, error = %err, "Model retries exhausted");
                return Err(AgentError::UpstreamExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.retry.backoff(attempt);
            tracing::warn!(
                agent = %request.agent,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying model call"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent: "Assistant".into(),
            instructions: "Be brief.".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            handoff_targets: vec![],
            output_schema: OutputSchema::Text,
            options: GenerationOptions::default(),
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "llama3.2");
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(AgentError::RateLimited("429".into())),
            Err(AgentError::ProviderUnavailable("503".into())),
            Ok(Completion::text("hello")),
        ]));
        let client = ModelClient::new(provider.clone(), Duration::from_secs(1), fast_retry(3));

        let completion = client.complete(&request(), &CancellationToken::new()).await.unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_upstream_errors() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Err(AgentError::RateLimited("429".into())),
            Err(AgentError::RateLimited("429".into())),
        ]));
        let client = ModelClient::new(provider.clone(), Duration::from_secs(1), fast_retry(1));

        let err = client.complete(&request(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::UpstreamExhausted { attempts: 2, .. }));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_auth_errors_are_not_retried() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(AgentError::Auth(
            "bad key".into(),
        ))]));
        let client = ModelClient::new(provider.clone(), Duration::from_secs(1), fast_retry(3));

        let err = client.complete(&request(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Completion::text("never")]));
        let client = ModelClient::new(provider, Duration::from_secs(1), RetryPolicy::none());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.complete(&request(), &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_slow_attempts_time_out_then_exhaust() {
        let provider = Arc::new(
            ScriptedProvider::from_fn(|_| Ok(Completion::text("late")))
                .with_delay(Duration::from_millis(200)),
        );
        let client = ModelClient::new(provider.clone(), Duration::from_millis(20), fast_retry(2));

        let err = client.complete(&request(), &CancellationToken::new()).await.unwrap_err();
        let AgentError::UpstreamExhausted { attempts, last } = err else {
            panic!("expected exhausted retries");
        };
        assert_eq!(attempts, 3);
        assert!(matches!(*last, AgentError::ModelTimeout(_)));
        assert_eq!(provider.calls(), 3);
        assert_eq!(client.usage().model_calls, 0);
    }

    #[tokio::test]
    async fn test_usage_is_metered_across_clones() {
        let mut reported = Completion::text("hello");
        reported.usage = Some(TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 20,
            total_tokens: 120,
        });
        let provider = Arc::new(ScriptedProvider::new(vec![
            reported,
            Completion::text("x".repeat(40)),
        ]));
        let client = ModelClient::new(provider, Duration::from_secs(1), RetryPolicy::none());
        let clone = client.clone();
        let cancel = CancellationToken::new();

        client.complete(&request(), &cancel).await.unwrap();
        clone.complete(&request(), &cancel).await.unwrap();

        let usage = client.usage();
        assert_eq!(usage.model_calls, 2);
        assert_eq!(usage.estimated_calls, 1);
        assert_eq!(usage.completion_tokens, 30);
        assert!(usage.prompt_tokens > 100);
    }

    #[test]
    fn test_replay_escapes_tool_name_as_json() {
        let mut completion = Completion::tool_call("x", serde_json::json!({}));
        completion.tool_calls[0].name = "we\"ird\u{7f}".into();
        let replay = completion.replay();
        let body = replay
            .trim_start_matches("```tool\n")
            .trim_end_matches("\n```");
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["tool"], "we\"ird\u{7f}");
    }

    #[test]
    fn test_replay_renders_native_calls() {
        let completion = Completion::tool_call("calculator", serde_json::json!({"expression": "1+1"}));
        let replay = completion.replay();
        assert!(replay.starts_with("```tool"));
        assert!(replay.contains("\"calculator\""));
    }
}
