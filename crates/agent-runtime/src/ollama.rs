//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference. Ollama has no
//! native tool calling here, so tools, handoffs and the answer format travel
//! in the system prompt and the decoder reads the text protocol back.

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, CompletionRequest, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
        TokenUsage,
    },
};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage, ChatMessageResponse, MessageRole},
    models::ModelOptions as OllamaOptions,
    Ollama,
};

/// Ollama provider configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `OLLAMA_HOST` and `OLLAMA_PORT` through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let host = lookup("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = lookup("OLLAMA_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Self { host, port }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Self {
        Self::from_config(OllamaConfig::default())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// System prompt followed by the conversation, in Ollama format
    fn convert_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(request.messages.len() + 1);
        if !request.instructions.is_empty() {
            out.push(ChatMessage::new(MessageRole::System, request.instructions.clone()));
        }
        out.extend(request.messages.iter().map(Self::convert_message));
        out
    }

    fn convert_message(message: &Message) -> ChatMessage {
        let role = match message.role {
            Role::System => MessageRole::System,
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
            Role::Tool => MessageRole::User, // Tools appear as user context
        };
        ChatMessage::new(role, message.content.clone())
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse, model: &str) -> Completion {
        Completion {
            content: response.message.content,
            tool_calls: Vec::new(),
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| {
                let prompt = d.prompt_eval_count as u32;
                let completion = d.eval_count as u32;
                TokenUsage {
                    prompt_tokens: prompt,
                    completion_tokens: completion,
                    total_tokens: prompt + completion,
                }
            }),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> OllamaOptions {
        OllamaOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(opts.max_tokens as i32)
    }
}

/// Unknown models and bad requests will not fix themselves; everything else
/// (refused connections, resets, 5xx) is worth retrying.
fn classify_error(detail: String) -> AgentError {
    let lower = detail.to_lowercase();
    if lower.contains("not found") || lower.contains("invalid") {
        AgentError::Provider(detail)
    } else {
        AgentError::ProviderUnavailable(detail)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let options = &request.options;
        let chat = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(request))
            .options(Self::build_options(options));

        tracing::debug!(
            agent = %request.agent,
            model = %options.model,
            messages = request.messages.len(),
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .send_chat_messages(chat)
            .await
            .map_err(|e| classify_error(e.to_string()))?;

        Ok(Self::convert_completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.clone(),
                name: m.name,
                context_length: None, // Not exposed by Ollama API
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::schema::OutputSchema;

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent: "Assistant".into(),
            instructions: "You are helpful.".into(),
            messages: vec![
                Message::user("What is 2+2?"),
                Message::tool("[Tool 'calculator' returned]\n4.0", "call-1"),
            ],
            tools: vec![],
            handoff_targets: vec![],
            output_schema: OutputSchema::Text,
            options: GenerationOptions::default(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn test_config_lookup_ignores_bad_port() {
        let config = OllamaConfig::from_lookup(|key| match key {
            "OLLAMA_HOST" => Some("http://gpu-box".into()),
            "OLLAMA_PORT" => Some("not-a-port".into()),
            _ => None,
        });
        assert_eq!(config.host, "http://gpu-box");
        assert_eq!(config.port, 11434);
    }

    #[test]
    fn test_message_conversion_prepends_instructions() {
        let converted = OllamaProvider::convert_messages(&request());
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].content, "You are helpful.");
        assert!(converted[2].content.contains("calculator"));
    }

    #[test]
    fn test_error_classification() {
        assert!(classify_error("error sending request: connection refused".into()).is_retryable());
        assert!(!classify_error("model 'llama9' not found".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        // nothing listens on port 1
        let provider = OllamaProvider::new("http://127.0.0.1", 1);
        assert!(!provider.health_check().await.unwrap());
        assert!(provider.list_models().await.unwrap_err().is_retryable());
    }
}
