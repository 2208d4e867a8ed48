//! Scripted Provider
//!
//! Deterministic stand-in for a model, for tests and offline demos. Replies
//! come from a queue or a closure over the request, and every request is kept
//! for inspection.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Completion, CompletionRequest, LlmProvider, ModelInfo};
use crate::error::{AgentError, Result};

type ResponderFn = dyn Fn(&CompletionRequest) -> Result<Completion> + Send + Sync;

enum Responder {
    Queue(Mutex<VecDeque<Result<Completion>>>),
    Func(Box<ResponderFn>),
}

/// Provider that replays scripted completions
pub struct ScriptedProvider {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Reply with these completions in order
    pub fn new(completions: Vec<Completion>) -> Self {
        Self::from_results(completions.into_iter().map(Ok).collect())
    }

    /// Reply with these results in order, errors included
    pub fn from_results(results: Vec<Result<Completion>>) -> Self {
        Self {
            responder: Responder::Queue(Mutex::new(results.into())),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Compute each reply from the request
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Completion> + Send + Sync + 'static,
    {
        Self {
            responder: Responder::Func(Box::new(f)),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completion calls received
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Copies of every request received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.responder {
            Responder::Queue(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into()))),
            Responder::Func(f) => f(request),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted".into(),
            name: "scripted".into(),
            context_length: None,
        }])
    }
}
