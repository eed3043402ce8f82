mod chat;
mod config;
mod errors;
mod llm_client;
mod recommendation;
mod routes;
mod sessions;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{CompletionService, GeminiClient};
use crate::recommendation::analyzer::MockAnalyzer;
use crate::routes::build_router;
use crate::sessions::{SessionLimits, SessionRegistry};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize completion client
    let llm: Arc<dyn CompletionService> =
        Arc::new(GeminiClient::new(&config).context("Failed to build Gemini HTTP client")?);
    info!(
        "Completion client initialized (model: {}, timeout: {:?})",
        llm.model_id(),
        config.chat_timeout
    );

    // Mock analysis backend until a real resume analysis service exists
    let analyzer = Arc::new(MockAnalyzer::new(config.analysis_delay));
    info!("Mock analyzer initialized (delay: {:?})", config.analysis_delay);

    let sessions = Arc::new(SessionRegistry::new(SessionLimits {
        chat_timeout: config.chat_timeout,
        idle_ttl: config.session_idle_ttl,
        max_sessions: config.max_sessions,
    }));
    sessions.spawn_sweeper(config.session_sweep_interval);
    info!(
        "Session registry initialized (idle ttl: {:?}, max: {})",
        config.session_idle_ttl, config.max_sessions
    );

    let state = AppState {
        sessions,
        llm,
        analyzer,
    };

    // The single-page UI is served from another origin.
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
