//! Multi-Agent Orchestrator
//!
//! Owns the agent set, the tool registry and the model provider, all
//! read-only after `build()`. Each `run_session` call gets its own
//! `AgentSession`; sessions share nothing mutable.
//!
//! ## Handoffs
//!
//! Exactly one agent is active at a time. When the active agent asks to hand
//! off, the request is recorded as a turn. A registered target becomes the
//! active agent and starts from the summary alone; an unregistered target
//! fails the session with `HandoffTargetNotFound`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentSpec, HandoffTarget};
use crate::config::RunConfig;
use crate::decoder::StructuredDecoder;
use crate::dispatcher::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::provider::{LlmProvider, ModelClient};
use crate::reasoning::{LoopOutcome, ReasoningLoop};
use crate::session::{AgentSession, SessionStore};
use crate::tool::ToolRegistry;
use crate::transcript::TurnPayload;

/// Builder for Orchestrator configuration
#[derive(Default)]
pub struct OrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    agents: Vec<AgentSpec>,
    entry: Option<String>,
    config: RunConfig,
    store: Option<Arc<dyn SessionStore>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn agent(mut self, spec: AgentSpec) -> Self {
        self.agents.push(spec);
        self
    }

    pub fn agents(mut self, specs: impl IntoIterator<Item = AgentSpec>) -> Self {
        self.agents.extend(specs);
        self
    }

    /// Entry agent; defaults to the first agent added
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Archive every session once it leaves RUNNING
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        let mut agents = BTreeMap::new();
        let mut order = Vec::with_capacity(self.agents.len());
        for spec in self.agents {
            if agents.contains_key(&spec.name) {
                return Err(AgentError::DuplicateAgent(spec.name));
            }
            order.push(spec.name.clone());
            agents.insert(spec.name.clone(), spec);
        }

        let entry = self
            .entry
            .or_else(|| order.first().cloned())
            .ok_or_else(|| AgentError::Config("at least one agent is required".into()))?;
        if !agents.contains_key(&entry) {
            return Err(AgentError::Config(format!(
                "entry agent '{}' is not registered",
                entry
            )));
        }

        for spec in agents.values() {
            if let Some(tool) = spec.tools.iter().find(|t| !self.tools.contains(t)) {
                return Err(AgentError::Config(format!(
                    "agent '{}' allows unregistered tool '{}'",
                    spec.name, tool
                )));
            }
            if let Some(target) = spec.handoffs.iter().find(|t| !agents.contains_key(*t)) {
                return Err(AgentError::Config(format!(
                    "agent '{}' declares handoff to unregistered agent '{}'",
                    spec.name, target
                )));
            }
        }

        self.config.validate()?;

        tracing::info!(
            agents = agents.len(),
            tools = self.tools.len(),
            entry = %entry,
            provider = provider.name(),
            "Orchestrator ready"
        );

        Ok(Orchestrator {
            provider,
            registry: Arc::new(self.tools),
            agents,
            entry,
            config: self.config,
            store: self.store,
        })
    }
}

/// Runs sessions across a fixed set of agents
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    agents: BTreeMap<String, AgentSpec>,
    entry: String,
    config: RunConfig,
    store: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.values()
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.store.as_ref()
    }

    /// Run a request with the default configuration
    pub async fn run(&self, request: impl Into<String>) -> Result<AgentSession> {
        self.run_session(request, &self.config, CancellationToken::new())
            .await
    }

    /// Run a request to completion.
    ///
    /// `Err` only for an invalid `config`; every failure after the session
    /// starts is reported on the returned session with its transcript so far.
    pub async fn run_session(
        &self,
        request: impl Into<String>,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> Result<AgentSession> {
        self.check_config(config)?;

        let client = ModelClient::new(
            self.provider.clone(),
            config.model_timeout,
            config.model_retry.clone(),
        );
        let dispatcher = ToolDispatcher::new(self.registry.clone(), config.tool_timeout);
        let decoder = StructuredDecoder::new(config.decode_retries);

        let mut session = AgentSession::new(request, self.entry.clone());
        tracing::info!(session = %session.id, entry = %self.entry, "Session started");

        let outcome = self
            .drive(&mut session, config, &client, &dispatcher, &decoder, &cancel)
            .await;
        session.set_usage(client.usage().priced(config.pricing.as_ref()));

        match outcome {
            Ok(answer) => {
                session.finish(answer)?;
                tracing::info!(
                    session = %session.id,
                    agent = %session.active_agent(),
                    iterations = session.iterations(),
                    turns = session.transcript().len(),
                    tokens = session.usage().total_tokens(),
                    "Session finished"
                );
            }
            Err(e) => {
                session.fail(&e)?;
                tracing::warn!(
                    session = %session.id,
                    agent = %session.active_agent(),
                    kind = %e.failure_kind(),
                    error = %e,
                    "Session failed"
                );
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session) {
                tracing::warn!(session = %session.id, error = %e, "Failed to archive session");
            }
        }

        Ok(session)
    }

    /// Per-request overrides may only narrow onto known agents and tools
    fn check_config(&self, config: &RunConfig) -> Result<()> {
        config.validate()?;
        for (agent, tools) in &config.allowed_tools {
            if !self.agents.contains_key(agent) {
                return Err(AgentError::Config(format!(
                    "allowed_tools names unknown agent '{}'",
                    agent
                )));
            }
            if let Some(tool) = tools.iter().find(|t| !self.registry.contains(t)) {
                return Err(AgentError::Config(format!(
                    "allowed_tools for '{}' names unregistered tool '{}'",
                    agent, tool
                )));
            }
        }
        Ok(())
    }

    fn handoff_targets(&self, spec: &AgentSpec) -> Vec<HandoffTarget> {
        spec.handoffs
            .iter()
            .filter_map(|name| self.agents.get(name))
            .map(|target| HandoffTarget {
                name: target.name.clone(),
                description: target.description.clone(),
            })
            .collect()
    }

    fn allowed_tools<'a>(&'a self, config: &'a RunConfig, spec: &'a AgentSpec) -> &'a BTreeSet<String> {
        config.allowed_tools.get(&spec.name).unwrap_or(&spec.tools)
    }

    async fn drive(
        &self,
        session: &mut AgentSession,
        config: &RunConfig,
        client: &ModelClient,
        dispatcher: &ToolDispatcher,
        decoder: &StructuredDecoder,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        loop {
            let spec = self
                .agents
                .get(session.active_agent())
                .ok_or_else(|| AgentError::HandoffTargetNotFound(session.active_agent().to_string()))?;
            let allowed = self.allowed_tools(config, spec);
            let targets = self.handoff_targets(spec);

            let looper = ReasoningLoop::new(
                spec,
                allowed,
                &targets,
                client,
                dispatcher,
                decoder,
                &config.generation,
                config.iteration_budget,
            );

            match looper.run(session, cancel).await? {
                LoopOutcome::Finished(answer) => return Ok(answer),
                LoopOutcome::Handoff { thought, mut request } => {
                    request.turn = Some(session.next_turn_index());
                    let accepted = self.agents.contains_key(&request.target);
                    session.record(TurnPayload::HandoffRequest {
                        thought,
                        request: request.clone(),
                        accepted,
                    });

                    if !accepted {
                        return Err(AgentError::HandoffTargetNotFound(request.target));
                    }

                    tracing::info!(
                        session = %session.id,
                        from = %spec.name,
                        to = %request.target,
                        "Handing off"
                    );
                    session.hand_off_to(&request.target, &request.summary);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use serde_json::json;

    use crate::error::FailureKind;
    use crate::provider::{Completion, ScriptedProvider, TokenUsage};
    use crate::usage::ModelPricing;
    use crate::session::{MemorySessionStore, SessionStatus};
    use crate::transcript::TurnKind;

    fn handoff(target: &str, summary: &str) -> Completion {
        Completion::text(format!(
            "Passing this on.\n```handoff\n{}\n```",
            json!({"handoff": target, "summary": summary})
        ))
    }

    fn team(provider: Arc<ScriptedProvider>) -> Orchestrator {
        Orchestrator::builder()
            .provider(provider)
            .agent(AgentSpec::new("Router", "Route the task.").handoffs(["Helper"]))
            .agent(AgentSpec::new("Helper", "Answer the task.").description("Answers things"))
            .entry("Router")
            .build()
            .unwrap()
    }

    fn kinds(session: &AgentSession) -> Vec<TurnKind> {
        session.transcript().turns().iter().map(|t| t.kind()).collect()
    }

    #[test]
    fn test_builder_validation() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new(vec![]));

        let err = Orchestrator::builder()
            .provider(provider.clone())
            .agent(AgentSpec::new("A", "x"))
            .agent(AgentSpec::new("A", "y"))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::DuplicateAgent(_)));

        let err = Orchestrator::builder()
            .provider(provider.clone())
            .agent(AgentSpec::new("A", "x"))
            .entry("B")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Config(_)));

        let err = Orchestrator::builder()
            .provider(provider.clone())
            .agent(AgentSpec::new("A", "x").tools(["calculator"]))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("calculator"));

        let err = Orchestrator::builder()
            .provider(provider)
            .agent(AgentSpec::new("A", "x").handoffs(["Ghost"]))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("Ghost"));
    }

    #[tokio::test]
    async fn test_accepted_handoff_switches_agent_and_seeds_summary() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            handoff("Helper", "find the capital of France"),
            Completion::text("Paris"),
        ]));
        let orchestrator = team(provider.clone());

        let session = orchestrator.run("What is the capital of France?").await.unwrap();

        assert_eq!(session.status(), SessionStatus::Finished);
        assert_eq!(session.active_agent(), "Helper");
        assert_eq!(session.answer(), Some(&json!("Paris")));
        assert_eq!(
            kinds(&session),
            vec![TurnKind::Thought, TurnKind::HandoffRequest, TurnKind::Thought, TurnKind::FinalAnswer]
        );

        let turns = session.transcript().turns();
        assert_eq!(turns[1].agent, "Router");
        assert_eq!(turns[2].agent, "Helper");

        let requests = provider.requests();
        assert_eq!(requests[0].handoff_targets.len(), 1);
        assert!(requests[1].handoff_targets.is_empty());
        assert_eq!(requests[1].messages.len(), 1);
        assert_eq!(requests[1].messages[0].content, "find the capital of France");
    }

    #[tokio::test]
    async fn test_session_accumulates_usage_across_agents() {
        let reported = Completion {
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 1000,
                total_tokens: 2000,
            }),
            ..Completion::text("Paris")
        };
        let provider = Arc::new(ScriptedProvider::new(vec![handoff("Helper", "capital of France"), reported]));
        let orchestrator = team(provider);
        let config = orchestrator
            .config()
            .clone()
            .with_pricing(ModelPricing::new(0.00015, 0.0006));

        let session = orchestrator
            .run_session("What is the capital of France?", &config, CancellationToken::new())
            .await
            .unwrap();

        let usage = session.usage();
        assert_eq!(usage.model_calls, 2);
        assert_eq!(usage.estimated_calls, 1);
        assert!(usage.prompt_tokens >= 1000);
        assert!(usage.completion_tokens > 1000);
        assert!(usage.cost_usd.unwrap() > 0.00075);

        let encoded = serde_json::to_value(&session).unwrap();
        assert_eq!(encoded["usage"]["model_calls"], 2);
    }

    #[tokio::test]
    async fn test_unknown_handoff_target_fails_without_switching() {
        let provider = Arc::new(ScriptedProvider::new(vec![handoff("Ghost", "boo")]));
        let orchestrator = team(provider);

        let session = orchestrator.run("help").await.unwrap();

        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.failure().unwrap().kind, FailureKind::HandoffTargetNotFound);
        assert_eq!(session.active_agent(), "Router");
        assert_eq!(kinds(&session), vec![TurnKind::Thought, TurnKind::HandoffRequest]);
        assert!(matches!(
            session.transcript().last().unwrap().payload,
            TurnPayload::HandoffRequest { accepted: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sessions_are_isolated() {
        let provider = Arc::new(
            ScriptedProvider::from_fn(|request| {
                let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
                Ok(Completion::text(format!("echo: {}", last)))
            })
            .with_delay(Duration::from_millis(10)),
        );
        let orchestrator = Orchestrator::builder()
            .provider(provider)
            .agent(AgentSpec::new("Echo", "Repeat the request."))
            .build()
            .unwrap();

        let (a, b) = tokio::join!(orchestrator.run("first"), orchestrator.run("second"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.id, b.id);
        assert_eq!(a.answer(), Some(&json!("echo: first")));
        assert_eq!(b.answer(), Some(&json!("echo: second")));
        assert_eq!(a.transcript().len(), 2);
        assert_eq!(b.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_fails_session() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Completion::text("late")]).with_delay(Duration::from_secs(30)),
        );
        let orchestrator = Orchestrator::builder()
            .provider(provider)
            .agent(AgentSpec::new("Slow", "Take your time."))
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let session = orchestrator
            .run_session("wait", orchestrator.config(), cancel)
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.failure().unwrap().kind, FailureKind::Cancelled);
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_auth_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(AgentError::Auth(
            "invalid key".into(),
        ))]));
        let orchestrator = Orchestrator::builder()
            .provider(provider.clone())
            .agent(AgentSpec::new("A", "x"))
            .build()
            .unwrap();

        let session = orchestrator.run("hi").await.unwrap();
        assert_eq!(session.failure().unwrap().kind, FailureKind::UpstreamApi);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected_before_session() {
        let orchestrator = team(Arc::new(ScriptedProvider::new(vec![])));
        let config = RunConfig::default().allow_tools("Nobody", ["calculator"]);
        let err = orchestrator
            .run_session("x", &config, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[tokio::test]
    async fn test_store_archives_finished_sessions() {
        let store = Arc::new(MemorySessionStore::new());
        let orchestrator = Orchestrator::builder()
            .provider(Arc::new(ScriptedProvider::new(vec![Completion::text("ok")])))
            .agent(AgentSpec::new("A", "x"))
            .store(store.clone())
            .build()
            .unwrap();

        let session = orchestrator.run("hi").await.unwrap();
        let archived = store.load(&session.id).unwrap().unwrap();
        assert_eq!(archived.status(), SessionStatus::Finished);
    }
}
