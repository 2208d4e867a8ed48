//! Tool Dispatcher
//!
//! Checks a tool call against the active agent's allowed set and the tool's
//! schema, then runs the executor on its own task under a timeout. Executor
//! faults, panics, timeouts and cancellation all come back as failed
//! observations; only structural problems (unknown tool, invalid arguments)
//! are returned as errors.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::error::{AgentError, Result};
use crate::schema::Arguments;
use crate::tool::{Observation, Tool, ToolCall, ToolErrorKind, ToolRegistry};

/// A call that passed lookup and validation and may reach its executor
pub struct PreparedCall {
    call: ToolCall,
    arguments: Arguments,
    executor: Arc<dyn Tool>,
}

impl PreparedCall {
    pub fn call(&self) -> &ToolCall {
        &self.call
    }
}

/// Runs tool calls for one agent scope
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Look up and validate a call without running it
    pub fn prepare(
        &self,
        agent: &str,
        call: ToolCall,
        allowed: &BTreeSet<String>,
    ) -> Result<PreparedCall> {
        let descriptor = self.registry.lookup(&call.name)?;
        if !allowed.contains(&call.name) {
            return Err(AgentError::ToolNotAllowed {
                tool: call.name,
                agent: agent.to_string(),
            });
        }

        let arguments = descriptor
            .schema()
            .validate(&call.arguments)
            .map_err(AgentError::Decoding)?;

        Ok(PreparedCall {
            executor: descriptor.executor(),
            arguments,
            call,
        })
    }

    /// Run a prepared call. Always yields exactly one observation.
    pub async fn execute(&self, prepared: PreparedCall, cancel: &CancellationToken) -> Observation {
        let PreparedCall {
            call,
            arguments,
            executor,
        } = prepared;

        let start = Instant::now();
        // dropping this future (session abandoned) aborts the executor too
        let mut task =
            AbortOnDropHandle::new(tokio::spawn(async move { executor.execute(&arguments).await }));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                task.abort();
                Err((ToolErrorKind::Cancelled, "tool call cancelled".to_string()))
            }
            joined = tokio::time::timeout(self.timeout, &mut task) => match joined {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(e))) => Err((ToolErrorKind::Fault, fault_detail(e))),
                Ok(Err(join_error)) => Err((ToolErrorKind::Fault, format!("tool panicked: {}", join_error))),
                Err(_) => {
                    task.abort();
                    Err((
                        ToolErrorKind::Timeout,
                        format!("tool '{}' timed out after {:?}", call.name, self.timeout),
                    ))
                }
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let observation = match outcome {
            Ok(value) => Observation::success(&call, value, duration_ms),
            Err((kind, detail)) => Observation::failure(&call, kind, detail, duration_ms),
        };

        let outcome_label = match &observation.error {
            None => "ok",
            Some(e) => match e.kind {
                ToolErrorKind::Fault => "error",
                ToolErrorKind::Timeout => "timeout",
                ToolErrorKind::Cancelled => "cancelled",
            },
        };
        tracing::info!(
            event = "tool_audit",
            tool = %call.name,
            call_id = %call.id,
            ok = observation.success,
            outcome = outcome_label,
            duration_ms,
            args_preview = %args_preview(&call.arguments),
            "tool"
        );

        observation
    }

    /// Validate and run a call for `agent`
    pub async fn dispatch(
        &self,
        agent: &str,
        call: ToolCall,
        allowed: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Observation> {
        let prepared = self.prepare(agent, call, allowed)?;
        Ok(self.execute(prepared, cancel).await)
    }
}

fn fault_detail(error: AgentError) -> String {
    match error {
        AgentError::ToolExecution(detail) => detail,
        other => other.to_string(),
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
