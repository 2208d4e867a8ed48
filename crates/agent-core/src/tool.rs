//! Tool System
//!
//! Tools are registered once at startup and looked up by name when the
//! reasoning loop asks for them. The registry is read-only after construction
//! and shared across sessions behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::schema::{Arguments, ToolSchema};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID for tracking
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments, validated against the tool schema before dispatch
    pub arguments: Value,

    /// Index of the Action turn that carries this call
    #[serde(default)]
    pub turn: Option<usize>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
            turn: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Why a tool call did not succeed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Fault,
    Timeout,
    Cancelled,
}

/// Failure detail carried inside an observation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub detail: String,
}

/// Outcome of one dispatched tool call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// ID of the originating tool call
    pub call_id: String,

    /// Tool that was called
    pub tool: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Result value on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error detail on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,

    /// Wall-clock execution time
    pub duration_ms: u64,
}

impl Observation {
    pub fn success(call: &ToolCall, result: Value, duration_ms: u64) -> Self {
        Self {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            success: true,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(
        call: &ToolCall,
        kind: ToolErrorKind,
        detail: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            success: false,
            result: None,
            error: Some(ToolError {
                kind,
                detail: detail.into(),
            }),
            duration_ms,
        }
    }

    /// Text fed back to the model
    pub fn render(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) if self.success => {
                format!("[Tool '{}' returned]\n{}", self.tool, render_value(result))
            }
            (_, Some(error)) => format!(
                "[Tool '{}' failed ({:?})]\n{}",
                self.tool, error.kind, error.detail
            ),
            _ => format!("[Tool '{}' returned nothing]", self.tool),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with arguments already validated against `schema()`
    async fn execute(&self, args: &Arguments) -> Result<Value>;
}

/// A registered tool: schema captured at registration plus its executor
#[derive(Clone)]
pub struct ToolDescriptor {
    schema: ToolSchema,
    executor: Arc<dyn Tool>,
}

impl ToolDescriptor {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn description(&self) -> &str {
        &self.schema.description
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    pub fn executor(&self) -> Arc<dyn Tool> {
        self.executor.clone()
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let schema = tool.schema();
        if self.tools.contains_key(&schema.name) {
            return Err(AgentError::DuplicateTool(schema.name));
        }
        tracing::debug!(tool = %schema.name, "Registered tool");
        self.tools.insert(
            schema.name.clone(),
            ToolDescriptor {
                schema,
                executor: tool,
            },
        );
        Ok(())
    }

    /// Look up a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor> {
        self.tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for the given subset of names, in name order
    pub fn list(&self, allowed: &BTreeSet<String>) -> Vec<&ToolSchema> {
        self.tools
            .values()
            .filter(|d| allowed.contains(d.name()))
            .map(ToolDescriptor::schema)
            .collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Generate system prompt section describing the given tools
pub fn generate_prompt_section(tools: &[ToolSchema]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

    for schema in tools {
        prompt.push_str(&schema.describe());
        prompt.push('\n');
    }

    prompt
}
