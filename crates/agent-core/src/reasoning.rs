//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for one agent.
//! The agent thinks, acts (via tools), observes, and either answers or hands
//! the session to another agent.
//!
//! ```text
//! START -> THINKING -> ACTING -> OBSERVING -> THINKING ...
//!                  \-> FINISHED
//!                  \-> handoff (returned to the orchestrator)
//! ```

use std::collections::BTreeSet;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::{handoff_prompt_section, AgentSpec, HandoffTarget};
use crate::decoder::{ModelAction, StructuredDecoder};
use crate::dispatcher::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{CompletionRequest, GenerationOptions, ModelClient};
use crate::schema::ToolSchema;
use crate::session::AgentSession;
use crate::tool::generate_prompt_section;
use crate::transcript::{HandoffRequest, Turn, TurnPayload};

const PROTOCOL_PROMPT: &str = "Work step by step. Use a tool when you need information or computation \
you do not have, then continue from its result. Emit at most one tool call or handoff per reply.";

/// How an agent's run ended, short of failure
#[derive(Clone, Debug, PartialEq)]
pub enum LoopOutcome {
    /// A validated final answer was recorded
    Finished(Value),
    /// The agent asked to pass control on; the orchestrator decides
    Handoff {
        thought: Option<String>,
        request: HandoffRequest,
    },
}

/// Reasoning loop controller for the active agent of one session
pub struct ReasoningLoop<'a> {
    spec: &'a AgentSpec,
    allowed: &'a BTreeSet<String>,
    handoff_targets: &'a [HandoffTarget],
    client: &'a ModelClient,
    dispatcher: &'a ToolDispatcher,
    decoder: &'a StructuredDecoder,
    options: &'a GenerationOptions,
    budget: usize,
}

impl<'a> ReasoningLoop<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: &'a AgentSpec,
        allowed: &'a BTreeSet<String>,
        handoff_targets: &'a [HandoffTarget],
        client: &'a ModelClient,
        dispatcher: &'a ToolDispatcher,
        decoder: &'a StructuredDecoder,
        options: &'a GenerationOptions,
        budget: usize,
    ) -> Self {
        Self {
            spec,
            allowed,
            handoff_targets,
            client,
            dispatcher,
            decoder,
            options,
            budget,
        }
    }

    /// Tool schemas visible to this agent
    fn visible_tools(&self) -> Vec<ToolSchema> {
        self.dispatcher
            .registry()
            .list(self.allowed)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Build the full system prompt including tools, handoffs and answer format
    pub fn system_prompt(&self, tools: &[ToolSchema]) -> String {
        let mut prompt = self.spec.instructions.trim().to_string();
        prompt.push_str("\n\n");
        prompt.push_str(PROTOCOL_PROMPT);

        if !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&generate_prompt_section(tools));
        }
        if !self.handoff_targets.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&handoff_prompt_section(self.handoff_targets));
        }

        prompt.push_str("\n\n");
        prompt.push_str(&self.spec.output.describe());
        prompt
    }

    /// Run THINKING cycles until the agent answers, hands off, or fails
    ///
    /// The iteration budget is counted on the session, so it spans handoffs.
    pub async fn run(
        &self,
        session: &mut AgentSession,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome> {
        let tools = self.visible_tools();
        let instructions = self.system_prompt(&tools);

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if session.iterations() >= self.budget {
                tracing::warn!(
                    session = %session.id,
                    agent = %self.spec.name,
                    budget = self.budget,
                    "Iteration budget exhausted"
                );
                return Err(AgentError::IterationBudgetExceeded(self.budget));
            }

            let iteration = session.begin_iteration();
            tracing::debug!(
                session = %session.id,
                agent = %self.spec.name,
                iteration,
                "Thinking"
            );

            let request = CompletionRequest {
                agent: self.spec.name.clone(),
                instructions: instructions.clone(),
                messages: render_segment(session.transcript().active_segment()),
                tools: tools.clone(),
                handoff_targets: self.handoff_targets.to_vec(),
                output_schema: self.spec.output.clone(),
                options: self.options.clone(),
            };

            match self.decoder.decode(self.client, &request, cancel).await? {
                ModelAction::ToolCall { thought, mut call } => {
                    call.turn = Some(session.next_turn_index());
                    let prepared = self.dispatcher.prepare(&self.spec.name, call, self.allowed)?;

                    tracing::debug!(
                        session = %session.id,
                        agent = %self.spec.name,
                        tool = %prepared.call().name,
                        "Executing tool"
                    );
                    session.record(TurnPayload::Action {
                        thought,
                        call: prepared.call().clone(),
                    });

                    let observation = self.dispatcher.execute(prepared, cancel).await;
                    session.record(TurnPayload::Observation(observation));

                    if cancel.is_cancelled() {
                        return Err(AgentError::Cancelled);
                    }
                }
                ModelAction::FinalAnswer { thought, value } => {
                    session.record(TurnPayload::FinalAnswer {
                        thought,
                        value: value.clone(),
                    });
                    return Ok(LoopOutcome::Finished(value));
                }
                ModelAction::Handoff { thought, request } => {
                    return Ok(LoopOutcome::Handoff { thought, request });
                }
            }
        }
    }
}

/// Render an agent's segment of the transcript as model message history
pub fn render_segment(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match &turn.payload {
            TurnPayload::Thought { text } => Message::user(text.clone()),
            TurnPayload::Action { thought, call } => {
                let block = format!(
                    "```tool\n{}\n```",
                    serde_json::json!({"tool": call.name, "arguments": call.arguments})
                );
                Message::assistant(with_thought(thought.as_deref(), &block)).with_name(turn.agent.clone())
            }
            TurnPayload::Observation(observation) => {
                Message::tool(observation.render(), observation.call_id.clone())
            }
            TurnPayload::FinalAnswer { thought, value } => {
                let answer = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Message::assistant(with_thought(thought.as_deref(), &answer)).with_name(turn.agent.clone())
            }
            TurnPayload::HandoffRequest { thought, request, .. } => {
                let block = format!(
                    "```handoff\n{}\n```",
                    serde_json::json!({"handoff": request.target, "summary": request.summary})
                );
                Message::assistant(with_thought(thought.as_deref(), &block)).with_name(turn.agent.clone())
            }
        })
        .collect()
}

fn with_thought(thought: Option<&str>, body: &str) -> String {
    match thought {
        Some(t) => format!("{}\n{}", t, body),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::RetryPolicy;
    use crate::message::Role;
    use crate::provider::{Completion, ScriptedProvider};
    use crate::schema::{Arguments, ParameterSchema};
    use crate::tool::{Tool, ToolRegistry};
    use crate::transcript::TurnKind;

    struct Adder;

    #[async_trait]
    impl Tool for Adder {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "add".into(),
                description: "Add two numbers".into(),
                parameters: vec![
                    ParameterSchema::required("a", "number", "First"),
                    ParameterSchema::required("b", "number", "Second"),
                ],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, args: &Arguments) -> Result<Value> {
            let a = args.get("a").and_then(Value::as_f64).unwrap_or_default();
            let b = args.get("b").and_then(Value::as_f64).unwrap_or_default();
            Ok(json!(a + b))
        }
    }

    struct Fixture {
        spec: AgentSpec,
        allowed: BTreeSet<String>,
        client: ModelClient,
        dispatcher: ToolDispatcher,
        decoder: StructuredDecoder,
        options: GenerationOptions,
    }

    impl Fixture {
        fn new(provider: Arc<ScriptedProvider>) -> Self {
            let mut registry = ToolRegistry::new();
            registry.register(Adder).unwrap();
            let spec = AgentSpec::new("Assistant", "You are a helpful assistant.").tools(["add"]);
            Self {
                allowed: spec.tools.clone(),
                spec,
                client: ModelClient::new(provider, Duration::from_secs(5), RetryPolicy::none()),
                dispatcher: ToolDispatcher::new(Arc::new(registry), Duration::from_secs(5)),
                decoder: StructuredDecoder::default(),
                options: GenerationOptions::default(),
            }
        }

        fn looper(&self, budget: usize) -> ReasoningLoop<'_> {
            ReasoningLoop::new(
                &self.spec,
                &self.allowed,
                &[],
                &self.client,
                &self.dispatcher,
                &self.decoder,
                &self.options,
                budget,
            )
        }
    }

    fn add_call() -> Completion {
        Completion::text("```tool\n{\"tool\": \"add\", \"arguments\": {\"a\": 2, \"b\": 2}}\n```")
    }

    #[tokio::test]
    async fn test_tool_then_answer_takes_two_cycles() {
        let provider = Arc::new(ScriptedProvider::new(vec![add_call(), Completion::text("2 + 2 is 4.")]));
        let fixture = Fixture::new(provider.clone());
        let mut session = AgentSession::new("What is 2 + 2?", "Assistant");

        let outcome = fixture
            .looper(10)
            .run(&mut session, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::Finished(json!("2 + 2 is 4.")));
        assert_eq!(session.iterations(), 2);

        let kinds: Vec<_> = session.transcript().turns().iter().map(Turn::kind).collect();
        assert_eq!(
            kinds,
            vec![TurnKind::Thought, TurnKind::Action, TurnKind::Observation, TurnKind::FinalAnswer]
        );

        let TurnPayload::Action { call, .. } = &session.transcript().turns()[1].payload else {
            panic!("expected action turn");
        };
        assert_eq!(call.turn, Some(1));

        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[2].role, Role::Tool);
        assert!(second.messages[2].content.contains("4"));
    }

    #[tokio::test]
    async fn test_budget_is_fatal_after_exactly_budget_cycles() {
        let provider = Arc::new(ScriptedProvider::from_fn(|_| Ok(add_call())));
        let fixture = Fixture::new(provider.clone());
        let mut session = AgentSession::new("loop forever", "Assistant");

        let err = fixture
            .looper(3)
            .run(&mut session, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::IterationBudgetExceeded(3)));
        assert_eq!(provider.calls(), 3);
        assert_eq!(session.transcript().count(TurnKind::Observation), 3);
    }

    #[tokio::test]
    async fn test_decoding_failure_retries_once_with_violation() {
        let bad = Completion::text("```tool\n{\"tool\": \"add\", \"arguments\": {\"a\": \"two\", \"b\": 2}}\n```");
        let provider = Arc::new(ScriptedProvider::new(vec![bad.clone(), bad]));
        let fixture = Fixture::new(provider.clone());
        let mut session = AgentSession::new("add", "Assistant");

        let err = fixture
            .looper(10)
            .run(&mut session, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Decoding(_)));
        assert_eq!(provider.calls(), 2);
        let retry = &provider.requests()[1];
        let correction = retry.messages.last().unwrap();
        assert_eq!(correction.role, Role::User);
        assert!(correction.content.contains("'a'"));
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_fatal_and_never_recorded() {
        let provider = Arc::new(ScriptedProvider::new(vec![add_call()]));
        let mut fixture = Fixture::new(provider);
        fixture.allowed.clear();
        let mut session = AgentSession::new("add", "Assistant");

        let err = fixture
            .looper(10)
            .run(&mut session, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ToolNotAllowed { .. }));
        assert_eq!(session.transcript().count(TurnKind::Action), 0);
    }

    #[test]
    fn test_system_prompt_sections() {
        let fixture = Fixture::new(Arc::new(ScriptedProvider::new(vec![])));
        let looper = fixture.looper(1);
        let prompt = looper.system_prompt(&looper.visible_tools());
        assert!(prompt.starts_with("You are a helpful assistant."));
        assert!(prompt.contains("### add"));
        assert!(!prompt.contains("## Handoffs"));
        assert!(prompt.contains("## Final Answer"));
    }

    #[test]
    fn test_rendered_action_is_valid_json() {
        let mut transcript = crate::transcript::Transcript::new();
        transcript.push("A", TurnPayload::Thought { text: "go".into() });
        transcript.push(
            "A",
            TurnPayload::Action {
                thought: None,
                call: crate::tool::ToolCall::new("we\"ird\u{7f}", json!({"q": "a\nb"})),
            },
        );

        let messages = render_segment(transcript.turns());
        let body = messages[1]
            .content
            .trim_start_matches("```tool\n")
            .trim_end_matches("\n```");
        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["tool"], "we\"ird\u{7f}");
        assert_eq!(parsed["arguments"]["q"], "a\nb");
    }
}
