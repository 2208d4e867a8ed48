//! Structured Output Decoder
//!
//! Turns a raw completion into exactly one of tool call, handoff or final
//! answer, validated against the schemas in the request. Invalid output gets a
//! bounded number of corrective re-prompts before surfacing as
//! `AgentError::Decoding`.
//!
//! Accepted shapes, in precedence order:
//!
//! ```text
//! native tool call            -> ToolCall (or Handoff when named "handoff")
//! ```tool {"tool": .., "arguments": {..}} ```   -> ToolCall
//! inline {"tool": .., "arguments": {..}}        -> ToolCall
//! ```handoff {"handoff": .., "summary": ..} ``` -> Handoff
//! inline {"handoff": .., "summary": ..}         -> Handoff
//! anything else                                 -> FinalAnswer
//! ```

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, CompletionRequest, ModelClient, RawToolCall};
use crate::schema::OutputSchema;
use crate::tool::ToolCall;
use crate::transcript::HandoffRequest;

/// Name of the pseudo-tool providers use for native handoffs
pub const HANDOFF_TOOL: &str = "handoff";

/// What the model decided to do
#[derive(Clone, Debug, PartialEq)]
pub enum ModelAction {
    ToolCall {
        thought: Option<String>,
        call: ToolCall,
    },
    Handoff {
        thought: Option<String>,
        request: HandoffRequest,
    },
    FinalAnswer {
        thought: Option<String>,
        value: Value,
    },
}

#[derive(Deserialize)]
struct ToolCallFormat {
    tool: String,
    #[serde(default, alias = "args")]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
struct HandoffFormat {
    #[serde(alias = "agent", alias = "target")]
    handoff: String,
    #[serde(default)]
    summary: String,
}

/// Decoder with an explicit corrective retry budget
#[derive(Clone, Debug)]
pub struct StructuredDecoder {
    max_retries: usize,
}

impl Default for StructuredDecoder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StructuredDecoder {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Ask the model and decode its answer, re-prompting with the violation on failure
    pub async fn decode(
        &self,
        client: &ModelClient,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelAction> {
        let mut corrected: Option<CompletionRequest> = None;
        let mut corrections = 0;

        loop {
            let current = corrected.as_ref().unwrap_or(request);
            let completion = client.complete(current, cancel).await?;

            let violation = match self.parse(&completion, current) {
                Ok(action) => return Ok(action),
                Err(violation) => violation,
            };

            if corrections >= self.max_retries {
                tracing::warn!(
                    agent = %request.agent,
                    corrections,
                    violation = %violation,
                    "Model output still invalid after correction"
                );
                return Err(AgentError::Decoding(violation));
            }

            corrections += 1;
            tracing::debug!(agent = %request.agent, violation = %violation, "Re-prompting model with validation error");

            let mut next = current.clone();
            next.messages
                .push(Message::assistant(completion.replay()).with_name(request.agent.clone()));
            next.messages.push(Message::user(correction_prompt(&violation)));
            corrected = Some(next);
        }
    }

    /// Decode one completion without calling the model
    pub fn parse(
        &self,
        completion: &Completion,
        request: &CompletionRequest,
    ) -> std::result::Result<ModelAction, String> {
        let action = if completion.tool_calls.is_empty() {
            parse_text(&completion.content, &request.output_schema)?
        } else {
            parse_native(completion)?
        };
        check_action(action, request)
    }
}

fn correction_prompt(violation: &str) -> String {
    format!(
        "Your previous response could not be used: {}\n\
         Respond again, following the required format exactly.",
        violation
    )
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn parse_native(completion: &Completion) -> std::result::Result<ModelAction, String> {
    let thought = non_empty(&completion.content);
    let chosen = completion
        .tool_calls
        .iter()
        .find(|c| c.name != HANDOFF_TOOL)
        .or_else(|| completion.tool_calls.first())
        .ok_or_else(|| "empty tool call list".to_string())?;

    let arguments = parse_native_arguments(chosen)?;

    if chosen.name == HANDOFF_TOOL {
        let format: HandoffFormat = serde_json::from_value(arguments)
            .map_err(|e| format!("malformed handoff payload: {}", e))?;
        return handoff_action(thought, format);
    }

    let mut call = ToolCall::new(&chosen.name, arguments);
    if let Some(id) = &chosen.id {
        call = call.with_id(id.clone());
    }
    Ok(ModelAction::ToolCall { thought, call })
}

fn parse_native_arguments(call: &RawToolCall) -> std::result::Result<Value, String> {
    if call.arguments.trim().is_empty() {
        return Err(format!("tool call '{}' has an empty argument payload", call.name));
    }
    serde_json::from_str(&call.arguments)
        .map_err(|e| format!("tool call '{}' has malformed JSON arguments: {}", call.name, e))
}

fn parse_text(content: &str, output: &OutputSchema) -> std::result::Result<ModelAction, String> {
    if let Some(block) = fenced(content, "tool")? {
        let format: ToolCallFormat = serde_json::from_str(block.inner)
            .map_err(|e| format!("malformed tool block: {}", e))?;
        return tool_action(non_empty(&block.rest), format);
    }

    if content.contains(r#""tool""#) {
        if let Some((inner, rest)) = braced(content) {
            if let Ok(format) = serde_json::from_str::<ToolCallFormat>(inner) {
                return tool_action(non_empty(&rest), format);
            }
        }
    }

    if let Some(block) = fenced(content, "handoff")? {
        let format: HandoffFormat = serde_json::from_str(block.inner)
            .map_err(|e| format!("malformed handoff block: {}", e))?;
        return handoff_action(non_empty(&block.rest), format);
    }

    if content.contains(r#""handoff""#) {
        if let Some((inner, rest)) = braced(content) {
            if let Ok(format) = serde_json::from_str::<HandoffFormat>(inner) {
                return handoff_action(non_empty(&rest), format);
            }
        }
    }

    parse_final(content, output)
}

fn parse_final(content: &str, output: &OutputSchema) -> std::result::Result<ModelAction, String> {
    match output {
        OutputSchema::Text => Ok(ModelAction::FinalAnswer {
            thought: None,
            value: Value::String(content.trim().to_string()),
        }),
        OutputSchema::Object { .. } => {
            let (json, rest) = match fenced(content, "json")? {
                Some(block) => (block.inner.to_string(), block.rest),
                None => braced(content)
                    .map(|(inner, rest)| (inner.to_string(), rest))
                    .ok_or_else(|| "final answer must be a JSON object".to_string())?,
            };
            let value: Value = serde_json::from_str(&json)
                .map_err(|e| format!("final answer is not valid JSON: {}", e))?;
            Ok(ModelAction::FinalAnswer {
                thought: non_empty(&rest),
                value,
            })
        }
    }
}

fn tool_action(
    thought: Option<String>,
    format: ToolCallFormat,
) -> std::result::Result<ModelAction, String> {
    if format.tool.trim().is_empty() {
        return Err("tool call is missing the tool name".into());
    }
    let arguments = format
        .arguments
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Ok(ModelAction::ToolCall {
        thought,
        call: ToolCall::new(format.tool.trim(), arguments),
    })
}

fn handoff_action(
    thought: Option<String>,
    format: HandoffFormat,
) -> std::result::Result<ModelAction, String> {
    if format.handoff.trim().is_empty() {
        return Err("handoff is missing the target agent".into());
    }
    if format.summary.trim().is_empty() {
        return Err("handoff summary is empty".into());
    }
    Ok(ModelAction::Handoff {
        thought,
        request: HandoffRequest {
            target: format.handoff.trim().to_string(),
            summary: format.summary.trim().to_string(),
            turn: None,
        },
    })
}

/// Schema checks that need the request context
fn check_action(
    action: ModelAction,
    request: &CompletionRequest,
) -> std::result::Result<ModelAction, String> {
    match action {
        ModelAction::ToolCall { thought, mut call } => {
            // Unknown names pass through; the dispatcher rejects them as a fatal config mismatch.
            if let Some(schema) = request.tools.iter().find(|t| t.name == call.name) {
                call.arguments = Value::Object(schema.validate(&call.arguments)?);
            }
            Ok(ModelAction::ToolCall { thought, call })
        }
        ModelAction::Handoff { .. } if request.handoff_targets.is_empty() => {
            Err("handoffs are not available to this agent; answer directly".into())
        }
        ModelAction::FinalAnswer { thought, value } => Ok(ModelAction::FinalAnswer {
            thought,
            value: request.output_schema.validate(&value)?,
        }),
        handoff => Ok(handoff),
    }
}

struct Fenced<'a> {
    inner: &'a str,
    rest: String,
}

/// Find a ```tag block. `Err` when the block is present but unterminated or empty.
fn fenced<'a>(content: &'a str, tag: &str) -> std::result::Result<Option<Fenced<'a>>, String> {
    let marker = format!("```{}", tag);
    let Some(start) = content.find(&marker) else {
        return Ok(None);
    };
    let body_start = start + marker.len();
    let body = &content[body_start..];
    if body.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
        return Ok(None);
    }
    let end = body
        .find("```")
        .ok_or_else(|| format!("unterminated {} block", tag))?;
    let inner = body[..end].trim();
    if inner.is_empty() {
        return Err(format!("empty {} block", tag));
    }

    let mut rest = content[..start].to_string();
    rest.push_str(&body[end + 3..]);
    Ok(Some(Fenced { inner, rest }))
}

/// Outermost `{...}` span and the text around it
fn braced(content: &str) -> Option<(&str, String)> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    let mut rest = content[..start].to_string();
    rest.push_str(&content[end + 1..]);
    Some((&content[start..=end], rest))
}
