//! Agent orchestrator HTTP server
//!
//! Axum-based server that runs agent sessions over a REST API.
//!
//! `AGENT_MODE=team` (default) serves the Router-led research team,
//! `AGENT_MODE=assistant` a single ReAct assistant.

mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{LlmProvider, Orchestrator, RunConfig};
use agent_runtime::OllamaProvider;
use agent_tools::{
    ExaSearchClient, MockSearchClient, MockWeather, OpenWeatherClient, SearchClient, ToolkitError,
    WeatherSource, assistant, default_registry, research_team, team,
};

use crate::handlers::{create_session, health_check, list_agents, list_models};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize LLM provider
    let provider = Arc::new(OllamaProvider::from_env());

    // Verify Ollama connection
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - sessions will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let search = search_client()?;
    let weather = weather_source()?;
    let tools = default_registry(search, weather)?;

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let config = RunConfig::from_env()?;
    let mode = std::env::var("AGENT_MODE").unwrap_or_else(|_| "team".into());
    let builder = Orchestrator::builder()
        .provider(provider)
        .tools(tools)
        .config(config);

    let orchestrator = match mode.as_str() {
        "team" => builder.agents(research_team()).entry(team::ROUTER).build()?,
        "assistant" => builder.agent(assistant()).build()?,
        other => anyhow::bail!("AGENT_MODE must be 'team' or 'assistant', got '{}'", other),
    };

    tracing::info!(mode = %mode, entry = %orchestrator.entry(), "Agents ready:");
    for spec in orchestrator.agents() {
        tracing::info!("  • {} - {}", spec.name, spec.description);
    }

    let mut state = AppState::new(orchestrator);
    if let Some(timeout) = session_timeout()? {
        tracing::info!(timeout_secs = timeout.as_secs_f64(), "Session deadline enabled");
        state = state.with_session_timeout(timeout);
    }

    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 agent server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/models      - List available models");
    tracing::info!("  GET  /api/agents      - List registered agents");
    tracing::info!("  POST /api/sessions    - Run a session");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        .route("/api/agents", get(list_agents))
        // Sessions
        .route("/api/sessions", post(create_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Exa when `EXA_API_KEY` is set, canned results otherwise
fn search_client() -> anyhow::Result<Arc<dyn SearchClient>> {
    match ExaSearchClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Exa web search configured");
            Ok(Arc::new(client))
        }
        Err(ToolkitError::MissingConfig(_)) => {
            tracing::warn!("⚠ Exa not configured - web_search returns mock results");
            tracing::warn!("  Set EXA_API_KEY in .env");
            Ok(Arc::new(MockSearchClient::new()))
        }
        Err(e) => Err(e.into()),
    }
}

/// OpenWeatherMap when `OPENWEATHER_API_KEY` is set, mock reports otherwise
fn weather_source() -> anyhow::Result<Arc<dyn WeatherSource>> {
    match OpenWeatherClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ OpenWeatherMap configured");
            Ok(Arc::new(client))
        }
        Err(ToolkitError::MissingConfig(_)) => {
            tracing::warn!("⚠ OpenWeatherMap not configured - weather returns mock reports");
            Ok(Arc::new(MockWeather::new()))
        }
        Err(e) => Err(e.into()),
    }
}

fn session_timeout() -> anyhow::Result<Option<Duration>> {
    std::env::var("SESSION_TIMEOUT_SECS")
        .ok()
        .map(|raw| parse_session_timeout(&raw))
        .transpose()
}

fn parse_session_timeout(raw: &str) -> anyhow::Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("SESSION_TIMEOUT_SECS is not a number: '{}'", raw))?;
    if secs <= 0.0 {
        anyhow::bail!("SESSION_TIMEOUT_SECS must be greater than zero");
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("SESSION_TIMEOUT_SECS is out of range: '{}'", raw))
}
