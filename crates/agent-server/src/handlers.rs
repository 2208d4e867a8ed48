//! HTTP Handlers

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agent_core::{AgentError, AgentSession, CancellationToken, RunConfig};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    pub handoffs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub entry: String,
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub provider: String,
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub request: String,
    /// Replaces the server's run configuration for this session only
    #[serde(default)]
    pub config: Option<RunConfig>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Errors that stop a session from starting
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            Self::Agent(AgentError::Config(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONFIG", self.to_string())
            }
            Self::Agent(e) => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR", e.user_message()),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.into(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.orchestrator.provider();
    let provider_connected = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.name().to_string(),
        provider_connected,
    })
}

/// Models the provider can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let provider = state.orchestrator.provider();
    let models = provider.list_models().await?;

    Ok(Json(ModelsResponse {
        provider: provider.name().to_string(),
        models: models.into_iter().map(|m| m.id).collect(),
    }))
}

/// Registered agents and what they may do
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let orchestrator = &state.orchestrator;
    let agents = orchestrator
        .agents()
        .map(|spec| AgentSummary {
            name: spec.name.clone(),
            description: spec.description.clone(),
            tools: spec.tools.iter().cloned().collect(),
            handoffs: spec.handoffs.clone(),
        })
        .collect();

    Json(AgentsResponse {
        entry: orchestrator.entry().to_string(),
        agents,
    })
}

/// Run one session to completion and return it with its transcript.
///
/// A failed session is still a 200: the failure is on the session body.
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<AgentSession>, ApiError> {
    if payload.request.trim().is_empty() {
        return Err(ApiError::BadRequest("request must not be empty".into()));
    }

    let orchestrator = &state.orchestrator;
    let config = payload.config.unwrap_or_else(|| orchestrator.config().clone());

    let cancel = CancellationToken::new();
    let deadline = state.session_timeout.map(|timeout| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Session deadline reached");
            cancel.cancel();
        })
    });

    let result = orchestrator
        .run_session(payload.request, &config, cancel)
        .await;

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    let session = result.map_err(|e| {
        tracing::warn!(error = %e, "Session rejected");
        ApiError::from(e)
    })?;

    Ok(Json(session))
}
