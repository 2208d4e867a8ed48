//! Date/Time Tool

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSchema};

/// Tool for reading the current UTC time
#[derive(Debug, Default)]
pub struct DateTimeTool;

impl DateTimeTool {
    pub fn new() -> Self {
        Self
    }
}

/// Render `now` in one of the supported formats
pub fn format_time(now: DateTime<Utc>, format: &str) -> Value {
    match format {
        "unix" => json!(now.timestamp()),
        "human" => json!(now.format("%A, %B %-d, %Y at %H:%M:%S UTC").to_string()),
        _ => json!(now.to_rfc3339()),
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time in UTC.".into(),
            parameters: vec![ParameterSchema::optional(
                "format",
                "string",
                "Output format: 'iso', 'human' or 'unix'",
            )
            .with_default(json!("iso"))
            .with_enum(vec![json!("iso"), json!("human"), json!("unix")])],
            category: Some("time".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, args: &Arguments) -> CoreResult<Value> {
        let format = args.get("format").and_then(Value::as_str).unwrap_or("iso");
        Ok(format_time(Utc::now(), format))
    }
}
