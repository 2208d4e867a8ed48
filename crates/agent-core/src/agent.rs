//! Agent Specifications
//!
//! Static description of a named agent: its instructions, the tools it may
//! call, the agents it may hand off to, and the shape of its final answer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::OutputSchema;

/// A configured agent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique name within an orchestrator
    pub name: String,

    /// One-line summary, shown to agents that may hand off to this one
    #[serde(default)]
    pub description: String,

    /// System instructions
    pub instructions: String,

    /// Tool names this agent may call
    #[serde(default)]
    pub tools: BTreeSet<String>,

    /// Agent names this agent may hand off to
    #[serde(default)]
    pub handoffs: Vec<String>,

    /// Declared final answer schema
    #[serde(default)]
    pub output: OutputSchema,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            tools: BTreeSet::new(),
            handoffs: Vec::new(),
            output: OutputSchema::Text,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn handoffs<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handoffs.extend(agents.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, output: OutputSchema) -> Self {
        self.output = output;
        self
    }
}

/// An agent advertised to the model as a handoff destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffTarget {
    pub name: String,
    pub description: String,
}

/// Prompt section listing handoff destinations
pub fn handoff_prompt_section(targets: &[HandoffTarget]) -> String {
    let mut prompt = String::from("## Handoffs\n\n");
    prompt.push_str(
        "If another agent is better suited to finish this task, hand it off with a JSON block:\n\n",
    );
    prompt.push_str(
        "```handoff\n{\"handoff\": \"agent_name\", \"summary\": \"what the next agent needs to know\"}\n```\n\n",
    );
    prompt.push_str("The next agent only sees your summary, so make it self-contained.\n\n");
    for target in targets {
        if target.description.is_empty() {
            prompt.push_str(&format!("- `{}`\n", target.name));
        } else {
            prompt.push_str(&format!("- `{}`: {}\n", target.name, target.description));
        }
    }
    prompt
}
