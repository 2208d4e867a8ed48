//! Session Management
//!
//! One `AgentSession` per user request: its transcript, the active agent and
//! a status that only ever moves forward (running to finished or failed).

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AgentError, FailureKind, Result};
use crate::transcript::{Transcript, TurnPayload};
use crate::usage::SessionUsage;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Running,
    Finished,
    Failed,
}

/// Why a session failed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// A complete agent session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSession {
    /// Unique identifier
    pub id: SessionId,

    /// The user's request
    pub request: String,

    transcript: Transcript,

    active_agent: String,

    /// Thinking cycles used so far
    iterations: usize,

    status: SessionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<SessionFailure>,

    /// Model calls and tokens spent on this session
    #[serde(default)]
    usage: SessionUsage,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// Start a session with the entry agent active and the request as its opening turn
    pub fn new(request: impl Into<String>, entry_agent: impl Into<String>) -> Self {
        let now = Utc::now();
        let request = request.into();
        let active_agent = entry_agent.into();
        let mut transcript = Transcript::new();
        transcript.push(active_agent.clone(), TurnPayload::Thought { text: request.clone() });

        Self {
            id: SessionId::new(),
            request,
            transcript,
            active_agent,
            iterations: 0,
            status: SessionStatus::Running,
            answer: None,
            failure: None,
            usage: SessionUsage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn active_agent(&self) -> &str {
        &self.active_agent
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn answer(&self) -> Option<&Value> {
        self.answer.as_ref()
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    pub fn usage(&self) -> &SessionUsage {
        &self.usage
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a turn on behalf of the active agent
    pub(crate) fn record(&mut self, payload: TurnPayload) -> usize {
        self.touch();
        let agent = self.active_agent.clone();
        self.transcript.push(agent, payload)
    }

    pub(crate) fn set_usage(&mut self, usage: SessionUsage) {
        self.usage = usage;
    }

    pub(crate) fn next_turn_index(&self) -> usize {
        self.transcript.next_index()
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.iterations += 1;
        self.iterations
    }

    /// Move control to another agent and seed its segment with the summary
    pub(crate) fn hand_off_to(&mut self, target: &str, summary: &str) {
        self.active_agent = target.to_string();
        self.record(TurnPayload::Thought {
            text: summary.to_string(),
        });
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(AgentError::Session(format!(
                "session {} already left RUNNING ({:?})",
                self.id, self.status
            )))
        }
    }

    /// RUNNING -> FINISHED
    pub(crate) fn finish(&mut self, answer: Value) -> Result<()> {
        self.ensure_running()?;
        self.status = SessionStatus::Finished;
        self.answer = Some(answer);
        self.touch();
        Ok(())
    }

    /// RUNNING -> FAILED
    pub(crate) fn fail(&mut self, error: &AgentError) -> Result<()> {
        self.ensure_running()?;
        self.status = SessionStatus::Failed;
        self.failure = Some(SessionFailure {
            kind: error.failure_kind(),
            message: error.to_string(),
        });
        self.touch();
        Ok(())
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }
}

/// Session store trait for archiving finished sessions
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &AgentSession) -> Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> Result<Option<AgentSession>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> Result<()>;

    /// Most recently updated sessions first
    fn list(&self, limit: usize) -> Result<Vec<AgentSession>>;
}

/// In-memory session store (for development/testing)
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, AgentSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &AgentSession) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<AgentSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(id);
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<AgentSession>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<_> = sessions.values().cloned().collect();

        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);

        Ok(result)
    }
}
