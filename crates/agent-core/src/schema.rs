//! Argument and Output Schemas
//!
//! A small JSON schema dialect shared by tool arguments and agent final answers.
//! Validation returns the normalized value (defaults filled in) or a list of
//! violations joined into one message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Validated tool arguments
pub type Arguments = Map<String, Value>;

/// Parameter definition for tool schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn check(&self, value: &Value, problems: &mut Vec<String>) {
        let type_ok = match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.as_i64().is_some()
                || value.as_u64().is_some()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !type_ok {
            problems.push(format!(
                "parameter '{}' must be of type {}, got {}",
                self.name,
                self.param_type,
                json_type_name(value)
            ));
            return;
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                problems.push(format!(
                    "parameter '{}' must be one of [{}], got {}",
                    self.name,
                    options.join(", "),
                    value
                ));
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a JSON object against a parameter list.
///
/// Unknown fields are rejected, missing optional fields take their default.
pub fn validate_object(
    parameters: &[ParameterSchema],
    value: &Value,
) -> std::result::Result<Arguments, String> {
    let Some(object) = value.as_object() else {
        return Err(format!("expected a JSON object, got {}", json_type_name(value)));
    };

    let mut problems = Vec::new();
    let mut normalized = Map::new();

    for key in object.keys() {
        if !parameters.iter().any(|p| &p.name == key) {
            problems.push(format!("unexpected parameter '{}'", key));
        }
    }

    for param in parameters {
        match object.get(&param.name) {
            Some(Value::Null) | None => {
                if param.required {
                    problems.push(format!("missing required parameter '{}'", param.name));
                } else if let Some(default) = &param.default {
                    normalized.insert(param.name.clone(), default.clone());
                }
            }
            Some(v) => {
                param.check(v, &mut problems);
                normalized.insert(param.name.clone(), v.clone());
            }
        }
    }

    if problems.is_empty() {
        Ok(normalized)
    } else {
        Err(problems.join("; "))
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    pub fn validate(&self, arguments: &Value) -> std::result::Result<Arguments, String> {
        validate_object(&self.parameters, arguments)
            .map_err(|e| format!("invalid arguments for tool '{}': {}", self.name, e))
    }

    /// Markdown description used in prompts
    pub fn describe(&self) -> String {
        let mut out = format!("### {}\n{}\n", self.name, self.description);
        if !self.parameters.is_empty() {
            out.push_str("**Parameters:**\n");
            out.push_str(&describe_parameters(&self.parameters));
        }
        out
    }
}

fn describe_parameters(parameters: &[ParameterSchema]) -> String {
    let mut out = String::new();
    for param in parameters {
        let required = if param.required { " (required)" } else { "" };
        out.push_str(&format!(
            "- `{}` ({}){}: {}\n",
            param.name, param.param_type, required, param.description
        ));
    }
    out
}

/// Declared shape of an agent's final answer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputSchema {
    /// Free text answer
    #[default]
    Text,
    /// JSON object answer
    Object { parameters: Vec<ParameterSchema> },
}

impl OutputSchema {
    pub fn object(parameters: Vec<ParameterSchema>) -> Self {
        Self::Object { parameters }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn validate(&self, value: &Value) -> std::result::Result<Value, String> {
        match self {
            Self::Text => match value.as_str().map(str::trim) {
                Some("") => Err("final answer is empty".into()),
                Some(text) => Ok(Value::String(text.to_string())),
                None => Err(format!(
                    "final answer must be text, got {}",
                    json_type_name(value)
                )),
            },
            Self::Object { parameters } => validate_object(parameters, value)
                .map(Value::Object)
                .map_err(|e| format!("final answer does not match the output schema: {}", e)),
        }
    }

    /// Prompt section describing how the final answer must look
    pub fn describe(&self) -> String {
        match self {
            Self::Text => "## Final Answer\n\nWhen you are done, reply with the answer as plain text.\n".into(),
            Self::Object { parameters } => {
                let mut out = String::from(
                    "## Final Answer\n\nWhen you are done, reply with a single JSON object in a ```json block with these fields:\n",
                );
                out.push_str(&describe_parameters(parameters));
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> ToolSchema {
        ToolSchema {
            name: "web_search".into(),
            description: "Search the web".into(),
            parameters: vec![
                ParameterSchema::required("query", "string", "Search query"),
                ParameterSchema::optional("num_results", "integer", "How many results")
                    .with_default(json!(3)),
            ],
            category: None,
            has_side_effects: false,
        }
    }

    #[test]
    fn test_defaults_are_filled() {
        let args = search_schema().validate(&json!({"query": "rust"})).unwrap();
        assert_eq!(args["num_results"], json!(3));
    }

    #[test]
    fn test_violations_are_reported_together() {
        let err = search_schema()
            .validate(&json!({"num_results": "five", "extra": true}))
            .unwrap_err();
        assert!(err.contains("unexpected parameter 'extra'"));
        assert!(err.contains("missing required parameter 'query'"));
        assert!(err.contains("must be of type integer"));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert!(search_schema().validate(&json!("rust")).is_err());
    }

    #[test]
    fn test_enum_membership() {
        let params = vec![ParameterSchema::required("format", "string", "fmt")
            .with_enum(vec![json!("iso"), json!("unix")])];
        assert!(validate_object(&params, &json!({"format": "iso"})).is_ok());
        assert!(validate_object(&params, &json!({"format": "human"})).is_err());
    }

    #[test]
    fn test_output_schema_text() {
        let schema = OutputSchema::Text;
        assert_eq!(schema.validate(&json!("  done ")).unwrap(), json!("done"));
        assert!(schema.validate(&json!("   ")).is_err());
    }
}
